//! Interned names.
//!
//! Every name the analyzer stores goes through a process-wide interner, so an
//! [`Identifier`] is a `u32` and comparing two of them is an integer compare.
//! Interned strings live for the rest of the process.

use std::fmt;
use std::sync::{OnceLock, RwLock};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

#[derive(Default)]
struct Interner {
    map: FxHashMap<&'static str, u32>,
    strings: Vec<&'static str>,
}

impl Interner {
    fn intern(&mut self, text: &str) -> u32 {
        if let Some(&index) = self.map.get(text) {
            return index;
        }
        let leaked: &'static str = Box::leak(text.to_owned().into_boxed_str());
        let index = self.strings.len() as u32;
        self.strings.push(leaked);
        self.map.insert(leaked, index);
        index
    }
}

fn interner() -> &'static RwLock<Interner> {
    static INTERNER: OnceLock<RwLock<Interner>> = OnceLock::new();
    INTERNER.get_or_init(|| {
        let mut interner = Interner::default();
        interner.intern("");
        RwLock::new(interner)
    })
}

/// An interned string. Equality is by index.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier(u32);

impl Identifier {
    /// The empty string, always index `0`.
    pub const EMPTY: Self = Self(0);

    pub fn new(text: &str) -> Self {
        let existing = interner()
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .map
            .get(text)
            .copied();
        match existing {
            Some(index) => Self(index),
            None => Self(
                interner()
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .intern(text),
            ),
        }
    }

    pub fn as_str(self) -> &'static str {
        interner()
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .strings
            .get(self.0 as usize)
            .copied()
            .unwrap_or("")
    }

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

impl Default for Identifier {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl From<&str> for Identifier {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dotted name such as `std.mem.Allocator`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct QualifiedIdentifier(SmallVec<[Identifier; 4]>);

impl QualifiedIdentifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits `text` on `.`; empty segments are dropped.
    pub fn from_dotted(text: &str) -> Self {
        Self(
            text.split('.')
                .filter(|part| !part.is_empty())
                .map(Identifier::new)
                .collect(),
        )
    }

    pub fn push(&mut self, identifier: Identifier) {
        self.0.push(identifier);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<Identifier> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<Identifier> {
        self.0.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Identifier> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Identifier> for QualifiedIdentifier {
    fn from_iter<T: IntoIterator<Item = Identifier>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for QualifiedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(part.as_str())?;
        }
        Ok(())
    }
}
