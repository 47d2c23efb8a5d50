//! Atomic Utilities
//!
//! A single atomic word that is either empty, a small marker value, or an
//! owned `Arc<T>`. Used for the monitor slot inside objects and for the
//! condition slot inside monitor records.
//!
//! ## Word Encoding
//!
//! ```text
//! 0                          -> Empty
//! 1 .. align_of::<T>() - 1   -> Marker (can never be a valid *const T)
//! >= align_of::<T>()         -> Arc::into_raw(arc) as usize
//! ```
//!
//! A cell only moves forward: empty or marker may be replaced by a pointer,
//! a pointer is never replaced. That is what makes handing out clones of the
//! stored `Arc` sound without hazard pointers.

use std::fmt;
use std::marker::PhantomData;
use std::mem::align_of;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Raw word of an empty cell
pub const EMPTY: usize = 0;

/// Decoded view of an `AtomicArcCell`
pub enum CellValue<T> {
    /// Nothing installed
    Empty,
    /// A marker tag
    Marker(usize),
    /// An installed value
    Occupied(Arc<T>),
}

impl<T> CellValue<T> {
    /// Installed value, if any
    pub fn into_arc(self) -> Option<Arc<T>> {
        match self {
            CellValue::Occupied(value) => Some(value),
            _ => None,
        }
    }
}

/// Result of a failed install: the rejected value and what the cell holds now
pub struct InstallRejected<T> {
    pub rejected: Arc<T>,
    pub current: CellValue<T>,
}

/// AtomicArcCell - forward-only atomic `Arc<T>` slot with marker support
pub struct AtomicArcCell<T> {
    word: AtomicUsize,
    _owns: PhantomData<Arc<T>>,
}

impl<T> AtomicArcCell<T> {
    /// Create an empty cell
    pub const fn empty() -> Self {
        Self {
            word: AtomicUsize::new(EMPTY),
            _owns: PhantomData,
        }
    }

    /// Create a cell holding `marker`
    ///
    /// # Panics
    /// If `marker` is zero or could be confused with a pointer to `T`.
    pub fn with_marker(marker: usize) -> Self {
        assert!(
            Self::is_marker(marker),
            "marker {:#x} collides with pointers to a type aligned to {}",
            marker,
            align_of::<T>()
        );
        Self {
            word: AtomicUsize::new(marker),
            _owns: PhantomData,
        }
    }

    #[inline]
    fn is_marker(word: usize) -> bool {
        word != EMPTY && word < align_of::<T>()
    }

    #[inline]
    fn is_pointer(word: usize) -> bool {
        word >= align_of::<T>()
    }

    fn decode(word: usize) -> CellValue<T> {
        if word == EMPTY {
            CellValue::Empty
        } else if Self::is_marker(word) {
            CellValue::Marker(word)
        } else {
            // SAFETY: pointer words come from `Arc::into_raw` and the cell keeps
            // its strong reference until drop, so the count is at least one.
            unsafe {
                let ptr = word as *const T;
                Arc::increment_strong_count(ptr);
                CellValue::Occupied(Arc::from_raw(ptr))
            }
        }
    }

    /// Load and decode the current word
    #[inline]
    pub fn load(&self) -> CellValue<T> {
        Self::decode(self.word.load(Ordering::Acquire))
    }

    /// Raw word, for identity comparisons
    #[inline]
    pub fn raw(&self) -> usize {
        self.word.load(Ordering::Acquire)
    }

    /// Check if nothing is installed
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw() == EMPTY
    }

    /// Check if the cell holds exactly this `Arc`
    #[inline]
    pub fn holds(&self, value: &Arc<T>) -> bool {
        self.raw() == Arc::as_ptr(value) as usize
    }

    /// Install `value` if the cell still holds `expected`
    ///
    /// `expected` must be `EMPTY` or a marker. On success returns the installed
    /// value. On failure the caller gets its value back together with the
    /// winner, and decides whether to discard it.
    pub fn try_install(
        &self,
        expected: usize,
        value: Arc<T>,
    ) -> Result<Arc<T>, InstallRejected<T>> {
        debug_assert!(!Self::is_pointer(expected), "installed values are never replaced");

        let new_word = Arc::into_raw(Arc::clone(&value)) as usize;
        match self
            .word
            .compare_exchange(expected, new_word, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(value),
            Err(actual) => {
                // SAFETY: the extra reference taken above was never published.
                unsafe { drop(Arc::from_raw(new_word as *const T)) };
                Err(InstallRejected {
                    rejected: value,
                    current: Self::decode(actual),
                })
            }
        }
    }
}

impl<T> Default for AtomicArcCell<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Drop for AtomicArcCell<T> {
    fn drop(&mut self) {
        let word = *self.word.get_mut();
        if Self::is_pointer(word) {
            // SAFETY: the cell owns one strong reference to every pointer it holds.
            unsafe { drop(Arc::from_raw(word as *const T)) };
        }
    }
}

impl<T> fmt::Debug for AtomicArcCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = self.raw();
        match word {
            EMPTY => write!(f, "AtomicArcCell(empty)"),
            w if Self::is_marker(w) => write!(f, "AtomicArcCell(marker {})", w),
            w => write!(f, "AtomicArcCell({:#x})", w),
        }
    }
}
