use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("latitude {0} out of range (-90..=90)")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} out of range (-180..=180)")]
    LongitudeOutOfRange(f64),
}
