// Wire
// Copyright (C) 2022 Wire Swiss GmbH

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program. If not, see http://www.gnu.org/licenses/.

mod encrypt;
mod state;

use std::sync::Arc;

pub use state::ContextState;

use crate::{
    crypt::Crypt,
    document::Document,
    key::broker::KeyBroker,
    marking::{Marking, MarkingsReply},
    namespace::Namespace,
    obfuscate::Obfuscated,
    schema_cache::Schema,
    Error, Result, Status,
};

/// What survives marking extraction: the command to encrypt, where to encrypt it and with which keys
#[derive(Debug, Default)]
struct Resolution {
    command: Document,
    markings: Vec<Marking>,
    broker: KeyBroker,
}

/// Per-state data of a context
#[derive(Debug)]
enum Phase {
    Init,
    NeedCollectionInfo { collection_info: Option<Document> },
    NeedMarkings { schema: Arc<Schema>, reply: Option<MarkingsReply> },
    NeedKeys(Resolution),
    NeedKms(Resolution),
    Ready(Resolution),
    Done,
    NothingToDo,
    Error(Status),
}

impl Phase {
    fn state(&self) -> ContextState {
        match self {
            Phase::Init => ContextState::Init,
            Phase::NeedCollectionInfo { .. } => ContextState::NeedCollectionInfo,
            Phase::NeedMarkings { .. } => ContextState::NeedMarkings,
            Phase::NeedKeys(_) => ContextState::NeedKeys,
            Phase::NeedKms(_) => ContextState::NeedKms,
            Phase::Ready(_) => ContextState::Ready,
            Phase::Done => ContextState::Done,
            Phase::NothingToDo => ContextState::NothingToDo,
            Phase::Error(_) => ContextState::Error,
        }
    }
}

/// Encrypts a single command.
///
/// The context never performs I/O: each state tells the caller what to fetch next, and the caller drives it
/// forward by feeding the answers back:
///
/// | state                | caller                                                                 |
/// |----------------------|------------------------------------------------------------------------|
/// | `NeedCollectionInfo` | run listCollections with `mongo_op`, `mongo_feed` the result, `mongo_done` |
/// | `NeedMarkings`       | send `mongo_op` to the markings service, `mongo_feed` the reply, `mongo_done` |
/// | `NeedKeys`           | find `mongo_op` in the key vault, `mongo_feed` each key, `mongo_done`    |
/// | `NeedKms`            | perform every `kms_requests` entry and `feed_kms_reply` / `supply_decrypted` |
/// | `Ready`              | `finalize`                                                             |
///
/// The first failure moves the context to [ContextState::Error] for good; its [Status] stays available and
/// every later call fails with it.
#[derive(Debug)]
pub struct EncryptionContext {
    crypt: Crypt,
    namespace: Option<Namespace>,
    local_schema: Option<Arc<Schema>>,
    phase: Phase,
}

impl EncryptionContext {
    pub(crate) fn new(crypt: Crypt) -> Self {
        Self {
            crypt,
            namespace: None,
            local_schema: None,
            phase: Phase::Init,
        }
    }

    /// Current state
    pub fn state(&self) -> ContextState {
        self.phase.state()
    }

    /// The status attached when the context failed, if it did
    pub fn status(&self) -> Option<&Status> {
        match &self.phase {
            Phase::Error(status) => Some(status),
            _ => None,
        }
    }

    /// The namespace given to [encrypt_init][Self::encrypt_init]
    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }

    /// Check `operation` is allowed in the current state
    fn guard(&self, operation: &'static str, allowed: impl Fn(ContextState) -> bool) -> Result<()> {
        match &self.phase {
            Phase::Error(status) => Err(Error::ContextFailed(status.clone())),
            phase if allowed(phase.state()) => Ok(()),
            phase => Err(Error::WrongState {
                operation,
                state: phase.state(),
            }),
        }
    }

    /// Attach `err` as the status of the context, unless it already failed
    fn fail(&mut self, err: Error) -> Error {
        if !matches!(self.phase, Phase::Error(_)) {
            let status = Status::from(&err);
            log::warn!(
                namespace:? = self.namespace.as_ref().map(Obfuscated::from),
                state:% = self.state(),
                kind:% = status.kind();
                "Encryption context failed"
            );
            self.phase = Phase::Error(status);
        }
        err
    }

    /// Run `f`, failing the context on error
    fn run<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        f(self).map_err(|err| self.fail(err))
    }

    fn advance(&mut self, next: Phase) -> Result<()> {
        let (from, to) = (self.state(), next.state());
        if !from.can_transition_to(to) {
            return Err(Error::WrongState {
                operation: "transition",
                state: from,
            });
        }
        log::debug!(namespace:? = self.namespace.as_ref().map(Obfuscated::from), from:% = from, to:% = to; "Transition");
        self.phase = next;
        Ok(())
    }
}
