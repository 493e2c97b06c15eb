//! Unit tests for the settings store.

use tempfile::TempDir;

use weather_indicator::location::Coordinates;
use weather_indicator::storage::config::{
    load_settings_from, LocationEntry, ProviderSelection, SettingsStore,
};
use weather_indicator::units::PressureUnit;

#[test]
fn test_updates_are_persisted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let store = SettingsStore::open(&path).unwrap();
    assert_eq!(store.snapshot().provider, ProviderSelection::Automatic);

    store
        .update(|s| {
            s.provider = ProviderSelection::OpenMeteo;
            s.pressure_unit = PressureUnit::InHg;
            s.locations.push(LocationEntry::new("Oslo", Coordinates::new(59.91, 10.75)));
        })
        .unwrap();
    store.set_forecast_days(4).unwrap();

    let on_disk = load_settings_from(&path).unwrap();
    assert_eq!(on_disk.provider, ProviderSelection::OpenMeteo);
    assert_eq!(on_disk.pressure_unit, PressureUnit::InHg);
    assert_eq!(on_disk.forecast_days, 4);
    assert_eq!(on_disk.locations[0].name, "Oslo");
    assert_eq!(on_disk.pressure_decimals(), 2);
}

#[test]
fn test_reload_picks_up_external_edits() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "forecast_days = 1\n").unwrap();

    let store = SettingsStore::open(&path).unwrap();
    assert_eq!(store.snapshot().forecast_days, 1);

    std::fs::write(&path, "forecast_days = 3\nfrozen = true\n").unwrap();
    let reloaded = store.reload().unwrap();
    assert_eq!(reloaded.forecast_days, 3);
    assert!(reloaded.frozen);
    assert_eq!(store.snapshot(), reloaded);
}

#[test]
fn test_in_memory_store_never_writes() {
    let store = SettingsStore::in_memory(Default::default());
    assert!(store.path().is_none());
    store.set_forecast_days(7).unwrap();
    assert_eq!(store.reload().unwrap().forecast_days, 7);
}
