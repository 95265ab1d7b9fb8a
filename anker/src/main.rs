use std::{sync::Arc, thread};

use anker::{HandleBridge, HeapRef, ManagedValue, NativePointer, RawHandle};
use clap::Parser;

/// Stress driver for the handle bridge: every thread wraps and unwraps the
/// same shared objects through its own dispatch sites and checks that all
/// threads observe the same handles.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value_t = 4)]
    threads: usize,

    #[arg(long, default_value_t = 100_000)]
    iterations: usize,

    #[arg(long, default_value_t = 8)]
    objects: usize,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let bridge = Arc::new(HandleBridge::new());
    let values: Arc<Vec<ManagedValue>> = Arc::new(
        (0..args.objects)
            .map(|index| ManagedValue::Object(HeapRef::new(format!("shared-{index}"))))
            .collect(),
    );

    let mut workers = Vec::new();
    for _ in 0..args.threads {
        let bridge = bridge.clone();
        let values = values.clone();
        let iterations = args.iterations;
        workers.push(thread::spawn(move || {
            let wrap = bridge.wrap_site();
            let unwrap = bridge.unwrap_site();
            let mut handles = Vec::with_capacity(values.len());
            for _ in 0..iterations {
                handles.clear();
                for value in values.iter() {
                    let wrapper = wrap.wrap(value);
                    let handle = wrapper.handle().expect("wrap assigns a handle");
                    let back = unwrap
                        .unwrap_handle(handle)
                        .expect("a just-wrapped value unwraps");
                    assert_eq!(&back, value, "boundary round-trip lost identity");
                    handles.push(handle);
                }
            }
            handles
        }));
    }

    let results: Vec<Vec<RawHandle>> = workers
        .into_iter()
        .map(|worker| worker.join().expect("worker finished"))
        .collect();
    for observed in results.iter().skip(1) {
        assert_eq!(observed, &results[0], "threads disagreed on handles");
    }

    // immediates and foreign words cross without touching the table
    let unwrap = bridge.unwrap_site();
    let five = bridge.wrap_value(&ManagedValue::Integer(5));
    let handle = five.handle().expect("assigned");
    let round = unwrap
        .unwrap_foreign(&NativePointer(handle.bits()))
        .expect("a tagged integer is a valid pointer word");
    println!(
        "integer 5 crossed as {:#x} and came back as {round:?}",
        handle.bits()
    );
    println!(
        "{} threads x {} iterations: {} live table handles",
        args.threads,
        args.iterations,
        bridge.live_handles()
    );
}
