//! Producer and consumer on separate threads.

use std::hint;
use std::sync::Mutex;
use std::thread;

use ringfifo::{Fifo, HeaderWidth, Inline, Locked, RecordFifo};

/// Every prefix the consumer observes is a prefix of what the producer sent.
#[test]
fn test_consumer_sees_producer_prefix() {
    const COUNT: u32 = 200_000;

    let mut fifo = Fifo::<u32, Inline<u32, 128>>::embedded().unwrap();
    let (producer, consumer) = fifo.split();

    thread::scope(|s| {
        s.spawn(move || {
            let mut next = 0;
            while next < COUNT {
                let end = (next + 13).min(COUNT);
                let chunk: Vec<u32> = (next..end).collect();
                let n = producer.copy_in(&chunk) as u32;
                if n == 0 {
                    hint::spin_loop();
                }
                next += n;
            }
        });

        s.spawn(move || {
            let mut expected = 0;
            let mut buf = [0u32; 17];
            while expected < COUNT {
                let queued = consumer.len();
                assert!(queued <= consumer.capacity());
                let n = consumer.copy_out(&mut buf);
                for &v in &buf[..n] {
                    assert_eq!(v, expected);
                    expected += 1;
                }
            }
            assert!(consumer.is_empty());
        });
    });
}

#[test]
fn test_split_halves_run_on_owned_threads() {
    let mut fifo = Fifo::<u64, _>::allocate(8).unwrap();
    let (producer, consumer) = fifo.split();

    let total = thread::scope(|s| {
        s.spawn(move || {
            for i in 1..=1000u64 {
                while producer.put(i).is_err() {
                    hint::spin_loop();
                }
            }
        });
        let sum = s.spawn(move || {
            let mut sum = 0;
            let mut seen = 0;
            while seen < 1000 {
                if let Some(v) = consumer.get() {
                    sum += v;
                    seen += 1;
                }
            }
            sum
        });
        sum.join().unwrap()
    });
    assert_eq!(total, 500_500);
    assert!(fifo.is_empty());
}

#[test]
fn test_record_stream_between_threads() {
    const RECORDS: usize = 10_000;

    let mut fifo = RecordFifo::allocate(512, HeaderWidth::Two).unwrap();
    let (producer, consumer) = fifo.split();

    thread::scope(|s| {
        s.spawn(move || {
            for i in 0..RECORDS {
                let payload: Vec<u8> = (0..(i % 300)).map(|b| b as u8).collect();
                while producer.push(&payload).is_err() {
                    hint::spin_loop();
                }
            }
        });

        let mut buf = vec![0u8; 300];
        let mut i = 0;
        while i < RECORDS {
            match consumer.pop(&mut buf) {
                Some(received) => {
                    assert_eq!(received.len, i % 300);
                    assert!(!received.is_truncated());
                    assert!(
                        buf[..received.copied]
                            .iter()
                            .enumerate()
                            .all(|(b, &v)| v == b as u8)
                    );
                    i += 1;
                }
                None => hint::spin_loop(),
            }
        }
    });
}

#[test]
fn test_locked_consumers_share_one_side() {
    const COUNT: u64 = 20_000;
    const CONSUMERS: usize = 3;

    let mut fifo = Fifo::<u64, _>::allocate(32).unwrap();
    let (producer, consumer) = fifo.split();
    let consumer = Locked::<_, Mutex<()>>::new(consumer);

    let mut collected: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let consumer = &consumer;
                s.spawn(move || {
                    let mut mine = Vec::new();
                    loop {
                        match consumer.with(|c| c.get()) {
                            Some(u64::MAX) => break,
                            Some(v) => mine.push(v),
                            None => hint::spin_loop(),
                        }
                    }
                    mine
                })
            })
            .collect();

        for i in 0..COUNT {
            while producer.put(i).is_err() {
                hint::spin_loop();
            }
        }
        for _ in 0..CONSUMERS {
            while producer.put(u64::MAX).is_err() {
                hint::spin_loop();
            }
        }

        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    collected.sort_unstable();
    let expected: Vec<u64> = (0..COUNT).collect();
    assert_eq!(collected, expected);
}
