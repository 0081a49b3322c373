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

use std::{fmt, str::FromStr};

use crate::{Error, Result};

/// A `database.collection` namespace.
///
/// Exactly one `.` separates the halves, and both must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    full: String,
    separator: usize,
}

impl Namespace {
    /// The database half
    pub fn database(&self) -> &str {
        &self.full[..self.separator]
    }

    /// The collection half
    pub fn collection(&self) -> &str {
        &self.full[self.separator + 1..]
    }

    /// The full `database.collection` string
    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some(separator) = s.find('.') else {
            return Err(Error::InvalidNamespace(s.into()));
        };
        if separator == 0 || separator + 1 == s.len() || s[separator + 1..].contains('.') {
            return Err(Error::InvalidNamespace(s.into()));
        }
        Ok(Self {
            full: s.into(),
            separator,
        })
    }
}

impl TryFrom<&str> for Namespace {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}
