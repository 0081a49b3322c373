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

/// Where an [EncryptionContext][super::EncryptionContext] stands, and so what the caller must do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum ContextState {
    /// Created, waiting for [encrypt_init][super::EncryptionContext::encrypt_init]
    Init,
    /// Run the listCollections filter from `mongo_op` and feed the collection info
    NeedCollectionInfo,
    /// Send the schema from `mongo_op` to the markings service and feed its reply
    NeedMarkings,
    /// Query the key vault with the filter from `mongo_op` and feed the key documents
    NeedKeys,
    /// Perform the decryptions listed by `kms_requests`
    NeedKms,
    /// Call `finalize`
    Ready,
    /// The encrypted command was produced
    Done,
    /// The command has nothing to encrypt and can be sent as is
    NothingToDo,
    /// Failed; see `status`
    Error,
}

use ContextState::*;

/// Every legal edge of the state machine, apart from `* -> Error`
const TRANSITIONS: &[(ContextState, ContextState)] = &[
    (Init, NeedCollectionInfo),
    (Init, NeedMarkings),
    (NeedCollectionInfo, NeedMarkings),
    (NeedCollectionInfo, NothingToDo),
    (NeedMarkings, NeedKeys),
    (NeedMarkings, NothingToDo),
    (NeedKeys, NeedKms),
    (NeedKeys, Ready),
    (NeedKms, Ready),
    (Ready, Done),
];

impl ContextState {
    /// Whether the machine may move from `self` to `next`
    pub fn can_transition_to(self, next: ContextState) -> bool {
        next == Error || TRANSITIONS.contains(&(self, next))
    }

    /// Whether no further transition can happen, apart from failing
    pub fn is_terminal(self) -> bool {
        matches!(self, Done | NothingToDo | Error)
    }

    /// Whether the caller exchanges documents with the database in this state
    pub fn needs_mongo(self) -> bool {
        matches!(self, NeedCollectionInfo | NeedMarkings | NeedKeys)
    }
}
