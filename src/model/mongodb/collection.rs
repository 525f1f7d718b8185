use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    announcement::Announcement,
    ballot::{Ballot, NewBallot},
    candidate::{Candidate, NewCandidate},
    contest::{Contest, NewContest},
    member::Member,
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Contest collections
const CONTESTS: &str = "contests";
impl MongoCollection for Contest {
    const NAME: &'static str = CONTESTS;
}
impl MongoCollection for NewContest {
    const NAME: &'static str = CONTESTS;
}

// Candidate collections
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}
impl MongoCollection for NewCandidate {
    const NAME: &'static str = CANDIDATES;
}

// Ballot collections
const BALLOTS: &str = "ballots";
impl MongoCollection for Ballot {
    const NAME: &'static str = BALLOTS;
}
impl MongoCollection for NewBallot {
    const NAME: &'static str = BALLOTS;
}

// Member collection
const MEMBERS: &str = "members";
impl MongoCollection for Member {
    const NAME: &'static str = MEMBERS;
}

// Announcement collection
const ANNOUNCEMENTS: &str = "announcements";
impl MongoCollection for Announcement {
    const NAME: &'static str = ANNOUNCEMENTS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Ballot collection: one ballot per candidate per voter, and one ballot
    // per selection slot per voter.
    let candidate_index = IndexModel::builder()
        .keys(doc! {"contest_id": 1, "voter_id": 1, "candidate_id": 1})
        .options(unique.clone())
        .build();
    let slot_index = IndexModel::builder()
        .keys(doc! {"contest_id": 1, "voter_id": 1, "slot": 1})
        .options(unique.clone())
        .build();
    Coll::<Ballot>::from_db(db)
        .create_indexes([candidate_index, slot_index], None)
        .await?;

    // Candidate collection.
    let contest_index = IndexModel::builder().keys(doc! {"contest_id": 1}).build();
    Coll::<Candidate>::from_db(db)
        .create_index(contest_index, None)
        .await?;

    // Announcement collection.
    let key_index = IndexModel::builder()
        .keys(doc! {"key": 1})
        .options(unique)
        .build();
    Coll::<Announcement>::from_db(db)
        .create_index(key_index, None)
        .await?;

    Ok(())
}
