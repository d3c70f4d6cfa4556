//! Split fifo throughput benchmark.
//!
//! Usage:
//!     cargo run --release --features bench --bin fifo_bench
//!     cargo run --release --features bench,tracing --bin fifo_bench
//!
//! Environment variables:
//!     PRODUCER_CPU=0  Pin producer to CPU 0 (default: 0)
//!     CONSUMER_CPU=2  Pin consumer to CPU 2 (default: 2)

use std::env;
use std::hint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use minstant::Instant;
use ringfifo::{Fifo, FifoError, HeaderWidth, RecordFifo};

const QUEUE_SIZE: usize = 1 << 16;
const ITERATIONS: usize = 1 << 24;
const BATCH: usize = 64;
const RECORDS: usize = 1 << 22;

type Payload = u64;

fn get_cpu_affinity() -> (Option<usize>, Option<usize>) {
    let producer_cpu = env::var("PRODUCER_CPU")
        .ok()
        .and_then(|s| s.parse().ok())
        .or(Some(0));
    let consumer_cpu = env::var("CONSUMER_CPU")
        .ok()
        .and_then(|s| s.parse().ok())
        .or(Some(2));
    (producer_cpu, consumer_cpu)
}

fn pin_to_cpu(cpu: Option<usize>) {
    if let Some(id) = cpu {
        core_affinity::set_for_current(core_affinity::CoreId { id });
    }
}

fn report(label: &str, count: usize, start: Instant) {
    let elapsed = start.elapsed();
    let ops_per_ms = count as u128 * 1_000_000 / elapsed.as_nanos().max(1);
    println!("{label}: {ops_per_ms} ops/ms");
}

fn bench_put_get(producer_cpu: Option<usize>, consumer_cpu: Option<usize>) -> Result<(), FifoError> {
    let mut fifo = Fifo::<Payload, _>::allocate(QUEUE_SIZE)?;
    let (producer, consumer) = fifo.split();
    let ready = AtomicBool::new(false);

    let start = thread::scope(|s| {
        let ready = &ready;
        s.spawn(move || {
            pin_to_cpu(consumer_cpu);
            ready.store(true, Ordering::Release);

            for expected in 0..ITERATIONS as Payload {
                loop {
                    if let Some(value) = consumer.get() {
                        assert_eq!(value, expected, "data corruption");
                        break;
                    }
                    hint::spin_loop();
                }
            }
        });

        while !ready.load(Ordering::Acquire) {
            hint::spin_loop();
        }
        pin_to_cpu(producer_cpu);

        let start = Instant::now();
        for i in 0..ITERATIONS as Payload {
            while producer.put(i).is_err() {
                hint::spin_loop();
            }
        }
        start
    });

    // The scope has joined the consumer, so every element was received.
    report("put/get", ITERATIONS, start);
    Ok(())
}

fn bench_bulk(producer_cpu: Option<usize>, consumer_cpu: Option<usize>) -> Result<(), FifoError> {
    let mut fifo = Fifo::<Payload, _>::allocate(QUEUE_SIZE)?;
    let (producer, consumer) = fifo.split();
    let start = Instant::now();

    thread::scope(|s| {
        s.spawn(move || {
            pin_to_cpu(consumer_cpu);
            let mut buf = [0; BATCH];
            let mut received = 0;
            while received < ITERATIONS {
                let n = consumer.copy_out(&mut buf);
                if n == 0 {
                    hint::spin_loop();
                }
                received += n;
            }
        });

        pin_to_cpu(producer_cpu);
        let batch: [Payload; BATCH] = std::array::from_fn(|i| i as Payload);
        let mut sent = 0;
        while sent < ITERATIONS {
            let want = BATCH.min(ITERATIONS - sent);
            let n = producer.copy_in(&batch[..want]);
            if n == 0 {
                hint::spin_loop();
            }
            sent += n;
        }
    });

    report("copy_in/copy_out", ITERATIONS, start);
    Ok(())
}

fn bench_records(producer_cpu: Option<usize>, consumer_cpu: Option<usize>) -> Result<(), FifoError> {
    let mut fifo = RecordFifo::allocate(QUEUE_SIZE, HeaderWidth::One)?;
    let (producer, consumer) = fifo.split();
    let start = Instant::now();

    thread::scope(|s| {
        s.spawn(move || {
            pin_to_cpu(consumer_cpu);
            let mut buf = [0u8; 256];
            let mut received = 0;
            while received < RECORDS {
                match consumer.pop(&mut buf) {
                    Some(_) => received += 1,
                    None => hint::spin_loop(),
                }
            }
        });

        pin_to_cpu(producer_cpu);
        let payload = [0xA5u8; 48];
        for i in 0..RECORDS {
            let len = 8 + i % 40;
            while producer.push(&payload[..len]).is_err() {
                hint::spin_loop();
            }
        }
    });

    report("records", RECORDS, start);
    Ok(())
}

fn main() -> Result<(), FifoError> {
    ringfifo::init_tracing();
    let (producer_cpu, consumer_cpu) = get_cpu_affinity();

    println!("ringfifo (size={QUEUE_SIZE}, iters={ITERATIONS}):");
    bench_put_get(producer_cpu, consumer_cpu)?;
    bench_bulk(producer_cpu, consumer_cpu)?;
    bench_records(producer_cpu, consumer_cpu)?;
    Ok(())
}
