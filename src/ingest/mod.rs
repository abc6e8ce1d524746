/// Inbound feed clients.
///
/// - `strikes`: line-delimited JSON lightning stream with bounding-box filtering
/// - `warnings`: polled JSON warning list
/// - `forecast`: polled plain-text daily forecast

pub mod forecast;
pub mod strikes;
pub mod warnings;
