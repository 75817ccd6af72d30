//-
// Copyright (c) 2020, 2024, Jason Lingle
//
// This file is part of msmtpq.
//
// msmtpq is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// msmtpq is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// msmtpq. If not, see <http://www.gnu.org/licenses/>.

use std::sync::Mutex;

use lazy_static::lazy_static;

lazy_static! {
    /// The most worker threads a pool will ever run, regardless of what was
    /// requested.
    ///
    /// Delivery is dominated by waiting on child processes, so this is allowed
    /// to exceed the CPU count somewhat.
    static ref MAX_THREADS: usize = std::env::var("MSMTPQ_MAX_THREADS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or_else(|| num_cpus::get() * 4)
        .max(1);
}

/// A bounded pool of worker threads for a single batch of work.
#[derive(Clone, Copy, Debug)]
pub struct WorkerPool {
    /// The number of threads to run, subject to `MAX_THREADS`.
    ///
    /// With 1 thread (or fewer), all work is done on the calling thread.
    pub threads: usize,
    /// The maximum number of inputs buffered ahead of the workers.
    pub buffer_size: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Self {
        WorkerPool {
            threads,
            buffer_size: threads.max(1) * 2,
        }
    }

    /// Run `mapper` on every item of `inputs` and reduce the results serially
    /// with `reduce`.
    ///
    /// Each input is handed to exactly one invocation of `mapper`. In
    /// single-threaded mode, inputs are processed strictly in iteration order;
    /// otherwise the order in which outputs reach `reduce` is unspecified.
    ///
    /// Once this call returns, any threads that were spawned have been cleaned
    /// up.
    pub fn run<I: IntoIterator, O>(
        self,
        inputs: I,
        mapper: impl Fn(I::Item) -> O + Send + Sync,
        mut reduce: impl FnMut(O) + Send,
    ) where
        I::Item: Send,
    {
        let threads = self.threads.min(*MAX_THREADS);
        if threads <= 1 {
            for input in inputs {
                reduce(mapper(input));
            }
            return;
        }

        let reduce = Mutex::new(reduce);
        let (input_send, input_recv) =
            crossbeam::channel::bounded(self.buffer_size.max(1));

        crossbeam::scope(|s| {
            for _ in 0..threads {
                let input_recv = input_recv.clone();
                let mapper = &mapper;
                let reduce = &reduce;
                s.spawn(move |_| {
                    for input in input_recv.iter() {
                        let output = mapper(input);
                        let mut reduce = reduce.lock().unwrap();
                        (*reduce)(output);
                    }
                });
            }

            for input in inputs {
                input_send.send(input).unwrap();
            }
            drop(input_send);
        })
        .unwrap();
    }
}
