/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

//! An in-process "universe" that runs each rank of an SPMD program on its own thread.
//!
//! Collectives are implemented with a single shared exchange area per communicator:
//! each member deposits its contribution, everyone waits, everyone reads what they need,
//! and everyone waits again before the area may be reused.
//!
//! # Panics
//!
//! If any rank panics, the universe is marked as poisoned and every rank that is (or later becomes)
//! blocked in a collective panics as well, so that a failing test fails rather than hangs.

use crate::Communicator;

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// How often a blocked rank wakes up to check whether a peer has died.
const POISON_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Entry point for running SPMD code on threads.
pub struct LocalUniverse;

impl LocalUniverse {
    /// Run `func` once on each of `size` threads, each with a communicator spanning all of them.
    ///
    /// Returns the outputs in rank order.
    ///
    /// # Panics
    ///
    /// Panics if `size == 0`.  If any rank panics, the first panic (by rank) is resumed
    /// on the calling thread after all ranks have stopped.
    pub fn run<R, F>(size: usize, func: F) -> Vec<R>
    where
        R: Send,
        F: Fn(LocalComm) -> R + Sync,
    {
        assert!(size > 0, "a universe needs at least one process");

        let universe = Arc::new(UniverseState::default());
        let world = Arc::new(Shared::new(universe.next_id(), size));
        trace!("starting local universe with {} processes", size);

        let func = &func;
        let results: Vec<_> = ::std::thread::scope(|scope| {
            let handles: Vec<_> = (0..size).map(|rank| {
                let comm = LocalComm {
                    rank,
                    shared: world.clone(),
                    universe: universe.clone(),
                    num_splits: Cell::new(0),
                };
                let universe = universe.clone();
                ::std::thread::Builder::new()
                    .name(format!("rank-{}", rank))
                    .spawn_scoped(scope, move || {
                        let _guard = PoisonOnPanic(universe);
                        func(comm)
                    })
                    .expect("failed to spawn rank thread")
            }).collect();

            handles.into_iter().map(|h| h.join()).collect()
        });

        let mut outputs = Vec::with_capacity(size);
        for result in results {
            match result {
                Ok(out) => outputs.push(out),
                Err(payload) => ::std::panic::resume_unwind(payload),
            }
        }
        outputs
    }
}

#[derive(Default)]
struct UniverseState {
    poisoned: AtomicBool,
    next_id: AtomicUsize,
    // sub-communicators under construction, keyed by (parent id, split sequence number, color).
    pending_splits: Mutex<HashMap<(usize, usize, usize), PendingSplit>>,
}

struct PendingSplit {
    shared: Arc<Shared>,
    unclaimed: usize,
}

impl UniverseState {
    fn next_id(&self) -> usize { self.next_id.fetch_add(1, Ordering::SeqCst) }
    fn is_poisoned(&self) -> bool { self.poisoned.load(Ordering::SeqCst) }
}

struct PoisonOnPanic(Arc<UniverseState>);

impl Drop for PoisonOnPanic {
    fn drop(&mut self) {
        if ::std::thread::panicking() {
            self.0.poisoned.store(true, Ordering::SeqCst);
        }
    }
}

/// State shared by all members of one communicator.
struct Shared {
    id: usize,
    size: usize,
    state: Mutex<ExchangeState>,
    cond: Condvar,
}

struct ExchangeState {
    slots: Vec<Vec<u8>>,
    arrived: usize,
    generation: u64,
}

impl Shared {
    fn new(id: usize, size: usize) -> Self {
        Shared {
            id,
            size,
            state: Mutex::new(ExchangeState {
                slots: vec![Vec::new(); size],
                arrived: 0,
                generation: 0,
            }),
            cond: Condvar::new(),
        }
    }

    // a panicking peer may poison the mutex; the data is still fine for our purposes
    // because we are about to panic anyways.
    fn lock(&self) -> MutexGuard<'_, ExchangeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait(&self, universe: &UniverseState) {
        let mut state = self.lock();
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation += 1;
            self.cond.notify_all();
            return;
        }

        while state.generation == generation {
            if universe.is_poisoned() {
                drop(state);
                panic!("a peer process panicked while this process was blocked in a collective");
            }
            state = match self.cond.wait_timeout(state, POISON_POLL_INTERVAL) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
    }
}

/// One rank's handle to a communicator of a [`LocalUniverse`].
///
/// Not `Sync`; each rank's handle belongs to the thread it was given to.
pub struct LocalComm {
    rank: usize,
    shared: Arc<Shared>,
    universe: Arc<UniverseState>,
    // number of times `split` has been called on this communicator.
    // Every member calls `split` in the same order, so this identifies the call.
    num_splits: Cell<usize>,
}

impl LocalComm {
    /// Deposit a contribution, then read from everybody's contributions.
    fn exchange<R>(&self, contribution: Vec<u8>, read: impl FnOnce(&[Vec<u8>]) -> R) -> R {
        self.shared.lock().slots[self.rank] = contribution;
        self.shared.wait(&self.universe);

        let out = read(&self.shared.lock().slots);

        // nobody may overwrite a slot until everyone is done reading
        self.shared.wait(&self.universe);
        out
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize { self.rank }
    fn size(&self) -> usize { self.shared.size }

    fn split(&self, color: usize, key: usize) -> Box<dyn Communicator> {
        let sequence = self.num_splits.get();
        self.num_splits.set(sequence + 1);

        let mut mine = Vec::with_capacity(16);
        mine.extend_from_slice(&(color as u64).to_le_bytes());
        mine.extend_from_slice(&(key as u64).to_le_bytes());

        let choices: Vec<(usize, usize, usize)> = self.exchange(mine, |slots| {
            slots.iter().enumerate().map(|(old_rank, bytes)| {
                let mut color = [0; 8];
                let mut key = [0; 8];
                color.copy_from_slice(&bytes[..8]);
                key.copy_from_slice(&bytes[8..16]);
                (u64::from_le_bytes(key) as usize, old_rank, u64::from_le_bytes(color) as usize)
            }).collect()
        });

        let mut members: Vec<_> = choices.iter().filter(|&&(_, _, c)| c == color).collect();
        members.sort();
        let new_size = members.len();
        let new_rank = members.iter().position(|&&(_, old_rank, _)| old_rank == self.rank)
            .expect("BUG: process missing from its own color");

        let shared = {
            let mut pending = self.universe.pending_splits.lock().unwrap_or_else(|e| e.into_inner());
            let map_key = (self.shared.id, sequence, color);
            let (shared, unclaimed) = {
                let universe = &self.universe;
                let entry = pending.entry(map_key).or_insert_with(|| PendingSplit {
                    shared: Arc::new(Shared::new(universe.next_id(), new_size)),
                    unclaimed: new_size,
                });
                entry.unclaimed -= 1;
                (entry.shared.clone(), entry.unclaimed)
            };
            if unclaimed == 0 {
                pending.remove(&map_key);
            }
            shared
        };

        Box::new(LocalComm {
            rank: new_rank,
            shared,
            universe: self.universe.clone(),
            num_splits: Cell::new(0),
        })
    }

    fn barrier(&self) { self.shared.wait(&self.universe) }

    fn broadcast_bytes(&self, root: usize, buf: &mut [u8]) {
        let contribution = if self.rank == root { buf.to_vec() } else { Vec::new() };
        self.exchange(contribution, |slots| buf.copy_from_slice(&slots[root]));
    }

    fn scatter_bytes(&self, root: usize, send: &[u8], recv: &mut [u8]) {
        let contribution = if self.rank == root { send.to_vec() } else { Vec::new() };
        let chunk = recv.len();
        let rank = self.rank;
        self.exchange(contribution, |slots| {
            recv.copy_from_slice(&slots[root][rank * chunk..(rank + 1) * chunk]);
        });
    }

    fn gather_bytes(&self, root: usize, send: &[u8], recv: &mut [u8]) {
        let is_root = self.rank == root;
        self.exchange(send.to_vec(), |slots| {
            if is_root {
                for (dest, src) in recv.chunks_mut(send.len().max(1)).zip(slots) {
                    dest.copy_from_slice(src);
                }
            }
        });
    }

    fn all_gather_bytes(&self, send: &[u8], recv: &mut [u8]) {
        self.exchange(send.to_vec(), |slots| {
            for (dest, src) in recv.chunks_mut(send.len().max(1)).zip(slots) {
                dest.copy_from_slice(src);
            }
        });
    }

    fn all_to_all_bytes(&self, send: &[u8], recv: &mut [u8]) {
        let chunk = recv.len() / self.shared.size;
        let rank = self.rank;
        self.exchange(send.to_vec(), |slots| {
            for (source, src) in slots.iter().enumerate() {
                recv[source * chunk..(source + 1) * chunk]
                    .copy_from_slice(&src[rank * chunk..(rank + 1) * chunk]);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CommExt;

    #[test]
    fn outputs_are_in_rank_order() {
        let ranks = LocalUniverse::run(5, |comm| (comm.rank(), comm.size()));
        assert_eq!(ranks, (0..5).map(|r| (r, 5)).collect::<Vec<_>>());
    }

    #[test]
    fn split_orders_by_key() {
        // two colors; within each, reverse the rank order through the key.
        let out = LocalUniverse::run(6, |comm| {
            let sub = comm.split(comm.rank() % 2, 100 - comm.rank());
            let members = sub.all_gather_value(comm.rank() as u64);
            (sub.rank(), sub.size(), members)
        });
        assert_eq!(out[0], (2, 3, vec![4, 2, 0]));
        assert_eq!(out[1], (2, 3, vec![5, 3, 1]));
        assert_eq!(out[4], (0, 3, vec![4, 2, 0]));
    }

    #[test]
    fn repeated_splits_do_not_interfere() {
        let out = LocalUniverse::run(4, |comm| {
            let a = comm.split(comm.rank() / 2, comm.rank());
            let b = comm.split(comm.rank() % 2, comm.rank());
            (a.all_reduce_sum(comm.rank() as f64), b.all_reduce_sum(comm.rank() as f64))
        });
        assert_eq!(out, vec![(1.0, 2.0), (1.0, 4.0), (5.0, 2.0), (5.0, 4.0)]);
    }

    #[test]
    fn scatter_and_gather_are_inverses() {
        let out = LocalUniverse::run(3, |comm| {
            let send: Vec<u32> = if comm.rank() == 1 { (0..6).collect() } else { vec![] };
            let mut mine = [0u32; 2];
            comm.scatter(1, &send, &mut mine);

            let mut back = if comm.rank() == 1 { vec![0u32; 6] } else { vec![] };
            comm.gather(1, &mine, &mut back);
            (mine, back)
        });
        assert_eq!(out[0].0, [0, 1]);
        assert_eq!(out[2].0, [4, 5]);
        assert_eq!(out[1].1, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn all_to_all_transposes_packages() {
        let out = LocalUniverse::run(3, |comm| {
            let send: Vec<u32> = (0..3).map(|dest| (10 * comm.rank() + dest) as u32).collect();
            let mut recv = vec![0; 3];
            comm.all_to_all(&send, &mut recv);
            recv
        });
        assert_eq!(out[1], vec![1, 11, 21]);
        assert_eq!(out[2], vec![2, 12, 22]);
    }

    #[test]
    #[should_panic]
    fn panic_on_one_rank_does_not_hang_the_rest() {
        LocalUniverse::run(3, |comm| {
            if comm.rank() == 2 {
                panic!("boom");
            }
            comm.barrier();
        });
    }
}
