use model::{
    fleet::{Vehicle, VehicleKind},
    position::GeoPosition,
};

const LINES: &[&str] = &["M10", "U2", "S41", "F7", "T3"];
const KINDS: &[VehicleKind] = &[
    VehicleKind::Bus,
    VehicleKind::Tram,
    VehicleKind::Train,
    VehicleKind::Ferry,
];

/// Deterministic synthetic fleet spread over a city-sized bounding box.
pub fn synthetic_fleet(count: usize) -> Vec<Vehicle> {
    (0..count)
        .map(|n| {
            let latitude = 52.3 + (n % 400) as f64 * 0.001;
            let longitude = 13.1 + (n % 700) as f64 * 0.001;
            let position = GeoPosition::new(latitude, longitude)
                .expect("synthetic coordinates are in range")
                .with_bearing((n * 37 % 360) as f64);
            Vehicle::new(
                format!("veh-{n:05}"),
                KINDS[n % KINDS.len()],
                LINES[n % LINES.len()],
                position,
            )
        })
        .collect()
}

/// Simulated per-vehicle work: snap the bearing to the nearest 5 degrees
/// and refresh the report timestamp.
pub fn normalize(mut vehicle: Vehicle) -> Vehicle {
    if let Some(bearing) = vehicle.position.bearing {
        vehicle.position.bearing = Some((bearing / 5.0).round() * 5.0 % 360.0);
    }
    let position = vehicle.position;
    vehicle.reposition(position);
    vehicle
}
