// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Tracking of the position of the next record.
//!
//! A position is a pair of a byte offset where a block header can be parsed and the number of
//! records of that block already consumed. Saving it lets a later
//! [header-less reader](crate::Reader::headerless_builder) resume at the exact next record.

use std::{cell::RefCell, fmt, rc::Rc};

/// Receives position updates from a [`Reader`](crate::Reader).
pub trait PositionTracker {
    /// Record the byte offset of the start of the current block.
    fn mark_current_offset(&mut self, offset: u64);

    /// Record how many records of the current block were consumed.
    fn set_object_index(&mut self, index: u64);
}

/// The position of the next record to read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ObjectPosition {
    /// Offset at which a block header can be parsed, possibly after a sync marker.
    pub block_offset: u64,
    /// Records of that block already read.
    pub object_index: u64,
}

impl PositionTracker for ObjectPosition {
    fn mark_current_offset(&mut self, offset: u64) {
        self.block_offset = offset;
    }

    fn set_object_index(&mut self, index: u64) {
        self.object_index = index;
    }
}

impl<T: PositionTracker + ?Sized> PositionTracker for &mut T {
    fn mark_current_offset(&mut self, offset: u64) {
        (**self).mark_current_offset(offset)
    }

    fn set_object_index(&mut self, index: u64) {
        (**self).set_object_index(index)
    }
}

impl<T: PositionTracker + ?Sized> PositionTracker for Rc<RefCell<T>> {
    fn mark_current_offset(&mut self, offset: u64) {
        self.borrow_mut().mark_current_offset(offset)
    }

    fn set_object_index(&mut self, index: u64) {
        self.borrow_mut().set_object_index(index)
    }
}

/// Whether a reader reports its position, decided once when the reader is built.
#[derive(Default)]
pub enum Tracking<'t> {
    #[default]
    Disabled,
    Enabled(Box<dyn PositionTracker + 't>),
}

impl<'t> Tracking<'t> {
    /// Report positions to `tracker`.
    pub fn enabled(tracker: impl PositionTracker + 't) -> Self {
        Tracking::Enabled(Box::new(tracker))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Tracking::Enabled(_))
    }

    pub(crate) fn mark_current_offset(&mut self, offset: u64) {
        if let Tracking::Enabled(tracker) = self {
            tracker.mark_current_offset(offset);
        }
    }

    pub(crate) fn set_object_index(&mut self, index: u64) {
        if let Tracking::Enabled(tracker) = self {
            tracker.set_object_index(index);
        }
    }
}

impl fmt::Debug for Tracking<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tracking::Disabled => f.write_str("Disabled"),
            Tracking::Enabled(_) => f.write_str("Enabled"),
        }
    }
}
