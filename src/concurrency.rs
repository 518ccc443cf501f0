use std::panic;

use crossbeam::thread;

/// Thread count used by the driver's fitness pass.
pub const NUM_THREADS: usize = 6;

/// Maps `f` over `items` on up to `num_threads` scoped threads, each taking one contiguous
/// chunk. Results come back in input order. A panic inside `f` is resumed on the caller.
pub fn par_map<T, U, F>(items: &[T], num_threads: usize, f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync,
{
    if num_threads <= 1 || items.len() <= 1 {
        return items.iter().map(f).collect();
    }

    let chunk_size = items.len().div_ceil(num_threads);
    let f = &f;

    let scoped = thread::scope(|s| {
        let handles: Vec<thread::ScopedJoinHandle<Vec<U>>> = items
            .chunks(chunk_size)
            .map(|chunk| s.spawn(move |_| chunk.iter().map(f).collect()))
            .collect();

        // joining in spawn order keeps the output aligned with the input
        let mut results = Vec::with_capacity(items.len());
        for handle in handles {
            match handle.join() {
                Ok(mut chunk_results) => results.append(&mut chunk_results),
                Err(payload) => panic::resume_unwind(payload),
            }
        }
        results
    });

    match scoped {
        Ok(results) => results,
        Err(payload) => panic::resume_unwind(payload),
    }
}
