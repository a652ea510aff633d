//! Deterministic clock and randomness for unit tests
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use crate::error::{KeyringError, KeyringResult};
use crate::providers::{Clock, RandomSource};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// Clock whose time only moves when told to. Sleeps are recorded, not slept.
#[derive(Clone)]
pub struct MockClock {
    now: Rc<Cell<i64>>,
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl MockClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
            sleeps: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn advance(&self, secs: i64) {
        self.now.set(self.now.get() + secs);
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for MockClock {
    fn now(&self) -> i64 {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

/// Random source replaying scripted draws. Once the script runs out it
/// falls back to a counter so ids stay distinct.
#[derive(Clone)]
pub struct ScriptedRandom {
    script: Rc<RefCell<VecDeque<Vec<u8>>>>,
    repeat: Option<Vec<u8>>,
    draws: Rc<Cell<usize>>,
}

impl ScriptedRandom {
    pub fn new(script: Vec<Vec<u8>>) -> Self {
        Self {
            script: Rc::new(RefCell::new(script.into())),
            repeat: None,
            draws: Rc::new(Cell::new(0)),
        }
    }

    pub fn repeating(chunk: Vec<u8>) -> Self {
        Self {
            repeat: Some(chunk),
            ..Self::new(Vec::new())
        }
    }

    pub fn draws(&self) -> usize {
        self.draws.get()
    }
}

impl RandomSource for ScriptedRandom {
    fn fill_bytes(&mut self, buf: &mut [u8]) -> KeyringResult<()> {
        let draw = self.draws.get();
        self.draws.set(draw + 1);

        let next = self.script.borrow_mut().pop_front().or_else(|| self.repeat.clone());
        match next {
            Some(chunk) => {
                assert_eq!(chunk.len(), buf.len(), "scripted draw has wrong length");
                buf.copy_from_slice(&chunk);
            }
            None => {
                let counter = (draw as u32).wrapping_add(1000).to_le_bytes();
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = counter[i % counter.len()];
                }
            }
        }
        Ok(())
    }
}

/// Random source that always fails
pub struct FailingRandom;

impl RandomSource for FailingRandom {
    fn fill_bytes(&mut self, _buf: &mut [u8]) -> KeyringResult<()> {
        Err(KeyringError::OutOfMemory("No memory to generate new secret key".to_string()))
    }
}
