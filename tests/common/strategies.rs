use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use shiptrack::models::Shipment;
use shiptrack::state_machine::ShipmentStatus;

/// Strategy for generating any shipment status
pub fn status_strategy() -> impl Strategy<Value = ShipmentStatus> {
    prop::sample::select(ShipmentStatus::ALL.to_vec())
}

/// Strategy for generating carrier tracking codes
pub fn tracking_code_strategy() -> impl Strategy<Value = String> {
    "[A-Z]{2}[0-9]{9}[A-Z]{2}"
}

/// Strategy for generating shipments with distinct ids, mixed statuses and
/// scattered update times
pub fn shipments_strategy(max: usize) -> impl Strategy<Value = Vec<Shipment>> {
    prop::collection::vec(
        (status_strategy(), tracking_code_strategy(), 0i64..3_600),
        1..=max,
    )
    .prop_map(|entries| {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (status, code, offset_secs))| {
                let updated = base + Duration::seconds(offset_secs);
                Shipment::new_pending(i as i64 + 1, 1, code, "correios", updated)
                    .with_status(status)
            })
            .collect()
    })
}
