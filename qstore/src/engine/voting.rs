use super::{ValueComparer, VotingMode};
use crate::prelude::*;

/// Accumulates per-backend outcomes of one read round and decides the
/// winner. Groups are kept in formation order; ties between equally large
/// qualifying groups go to the first-formed one, and the not-found group is
/// only considered after every value group.
pub(crate) struct Ballot {
    comparer: ValueComparer,
    groups: Vec<Group>,
    not_found: Vec<SharedBackend>,
}

struct Group {
    value: Value,
    members: Vec<SharedBackend>,
}

pub(crate) struct Decision {
    /// `None` when the not-found group won.
    pub value: Option<Value>,
    pub winners: Vec<SharedBackend>,
    pub losers: Vec<SharedBackend>,
}

impl Ballot {
    pub(crate) fn new(comparer: ValueComparer) -> Self {
        Self {
            comparer,
            groups: Vec::new(),
            not_found: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, backend: SharedBackend, outcome: Result<Value, Error>) {
        match outcome {
            Ok(value) => {
                let comparer = self.comparer;
                match self
                    .groups
                    .iter_mut()
                    .find(|group| comparer(&group.value, &value))
                {
                    Some(group) => group.members.push(backend),
                    None => self.groups.push(Group {
                        value,
                        members: vec![backend],
                    }),
                }
            }
            Err(err) if err.is_key_not_found() => self.not_found.push(backend),
            // unrecoverable outcome: the backend joins neither side of the vote
            Err(err) => debug!("vote from {} discarded: {}", backend.address(), err),
        }
    }

    pub(crate) fn decide(self, votes_required: usize, mode: VotingMode) -> Result<Decision, Error> {
        let mut best = None;
        let mut best_votes = 0;
        for (index, group) in self.groups.iter().enumerate() {
            if group.members.len() >= votes_required && group.members.len() > best_votes {
                best = Some(index);
                best_votes = group.members.len();
            }
        }

        let not_found_wins = mode == VotingMode::VoteOnNotFound
            && self.not_found.len() >= votes_required
            && self.not_found.len() > best_votes;

        if not_found_wins {
            let losers = self
                .groups
                .into_iter()
                .flat_map(|group| group.members)
                .collect();
            return Ok(Decision {
                value: None,
                winners: self.not_found,
                losers,
            });
        }

        let winner = match best {
            Some(index) => index,
            None => {
                debug!("no equivalence group reached {} votes", votes_required);
                return Err(Error::consistency());
            }
        };

        let mut value = None;
        let mut winners = Vec::new();
        let mut losers = Vec::new();
        for (index, group) in self.groups.into_iter().enumerate() {
            if index == winner {
                value = Some(group.value);
                winners = group.members;
            } else {
                losers.extend(group.members);
            }
        }
        // replicas that reported the key missing lost to whichever value won
        losers.extend(self.not_found);

        Ok(Decision {
            value,
            winners,
            losers,
        })
    }
}
