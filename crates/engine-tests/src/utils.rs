use engine_core::progress::{BatchProgress, ProgressCallback};
use model::{
    fleet::{Vehicle, VehicleKind},
    position::GeoPosition,
};
use std::sync::{Arc, Mutex};

/// Deterministic fleet used across the scenarios.
pub fn fleet(count: usize) -> Vec<Vehicle> {
    let kinds = [
        VehicleKind::Bus,
        VehicleKind::Tram,
        VehicleKind::Train,
        VehicleKind::Ferry,
    ];
    (0..count)
        .map(|n| {
            let position = GeoPosition::new(48.1 + (n % 90) as f64 * 0.01, 11.5)
                .expect("test coordinates are in range");
            Vehicle::new(
                format!("veh-{n:05}"),
                kinds[n % kinds.len()],
                format!("line-{}", n % 5),
                position,
            )
        })
        .collect()
}

/// Progress callback that records every snapshot it sees.
pub fn recording_progress() -> (ProgressCallback, Arc<Mutex<Vec<BatchProgress>>>) {
    let seen: Arc<Mutex<Vec<BatchProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: ProgressCallback = Arc::new(move |progress| sink.lock().unwrap().push(progress));
    (callback, seen)
}
