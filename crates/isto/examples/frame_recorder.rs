//! Minimal producer: synthesizes camera-style frames, stores them in
//! batches under a deliberately tiny rotating budget, and prints every
//! id the eviction sweep deletes.

use isto::{Configuration, DataItem, Storage};

fn main() -> Result<(), isto::IstoError> {
    tracing_subscriber::fmt::init();

    let mut storage = Storage::open(
        Configuration::new()
            .rotating_directory("frame-data/rotating")
            .permanent_directory("frame-data/permanent")
            .max_rotating_data_to_keep_in_gib(0.001)
            .tags(["camera"]),
    )?;
    storage.set_rotating_deleted_callback(|id| println!("evicted: {id}"));

    for batch in 0..8usize {
        let frames: Vec<DataItem> = (0..16usize)
            .map(|offset| {
                let sequence = batch * 16 + offset;
                DataItem::new(
                    format!("frame-{sequence:06}.bin"),
                    synthetic_frame(sequence),
                    chrono::Utc::now(),
                )
                .with_tag("camera", if sequence % 2 == 0 { "left" } else { "right" })
            })
            .collect();
        storage.save_batch(&frames, false)?;
    }

    let stats = storage.stats()?;
    println!(
        "kept {} frames ({} bytes) in the rotating tier",
        stats.rotating_items, stats.rotating_bytes
    );
    storage.close()
}

fn synthetic_frame(sequence: usize) -> Vec<u8> {
    (0..32 * 1024).map(|index| ((index + sequence) % 251) as u8).collect()
}
