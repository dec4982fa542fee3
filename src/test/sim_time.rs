use crate::sim::SimTime;

#[test]
fn sim_time_unit_conversions() {
    assert_eq!(SimTime::from_micros(1), SimTime(1_000));
    assert_eq!(SimTime::from_millis(1), SimTime(1_000_000));
    assert_eq!(SimTime::from_secs(1), SimTime(1_000_000_000));
}

#[test]
fn sim_time_unit_conversions_saturate_on_overflow() {
    assert_eq!(SimTime::from_micros(u64::MAX), SimTime(u64::MAX));
    assert_eq!(SimTime::from_millis(u64::MAX), SimTime(u64::MAX));
    assert_eq!(SimTime::from_secs(u64::MAX), SimTime(u64::MAX));
}

#[test]
fn tx_time_rounds_up_to_whole_nanoseconds() {
    assert_eq!(SimTime::tx_time(1500, 10_000_000_000), SimTime(1_200));
    assert_eq!(SimTime::tx_time(1, 3), SimTime(2_666_666_667));
    assert_eq!(SimTime::tx_time(0, 10_000_000_000), SimTime::ZERO);
}

#[test]
fn tx_time_on_zero_bandwidth_is_effectively_forever() {
    assert!(SimTime::tx_time(1, 0) > SimTime::from_secs(1_000_000));
}

#[test]
fn since_and_add_saturate() {
    assert_eq!(SimTime(5).since(SimTime(10)), SimTime::ZERO);
    assert_eq!(SimTime(10).since(SimTime(4)), SimTime(6));
    assert_eq!(SimTime(u64::MAX) + SimTime(1), SimTime(u64::MAX));
}
