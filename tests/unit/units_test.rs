//! Unit tests for unit conversion and display formatting.

use weather_indicator::units::{
    beaufort, compass_index, format_pressure, format_temperature, format_wind,
    format_wind_direction, NumberLocale, PressureUnit, TemperatureUnit, WindDirectionStyle,
    WindSpeedUnit, UNAVAILABLE,
};

#[test]
fn test_freezing_point_in_every_unit() {
    let en = NumberLocale::english();
    let expected = [
        (TemperatureUnit::Celsius, "0.00 \u{00B0}C"),
        (TemperatureUnit::Fahrenheit, "32.00 \u{00B0}F"),
        (TemperatureUnit::Kelvin, "273.15 K"),
        (TemperatureUnit::Rankine, "491.67 \u{00B0}Ra"),
        (TemperatureUnit::Reaumur, "0.00 \u{00B0}R\u{00E9}"),
        (TemperatureUnit::Roemer, "7.50 \u{00B0}R\u{00F8}"),
        (TemperatureUnit::Delisle, "150.00 \u{00B0}De"),
        (TemperatureUnit::Newton, "\u{2212}0.33 \u{00B0}N"),
    ];

    for (unit, text) in expected {
        assert_eq!(format_temperature(Some(0.0), unit, 2, &en), text, "{:?}", unit);
    }
    assert_eq!(
        format_temperature(Some(0.0), TemperatureUnit::Fahrenheit, 1, &en),
        "32.0 \u{00B0}F"
    );

    // Exact conversions, before rounding
    assert_eq!(TemperatureUnit::Kelvin.from_celsius(0.0), 273.15);
    assert_eq!(TemperatureUnit::Fahrenheit.from_celsius(0.0), 32.0);
}

#[test]
fn test_missing_values_render_placeholder() {
    let en = NumberLocale::english();
    assert_eq!(format_temperature(None, TemperatureUnit::Celsius, 1, &en), UNAVAILABLE);
    assert_eq!(format_pressure(Some(f64::NAN), PressureUnit::Hpa, 0, &en), UNAVAILABLE);
    assert_eq!(
        format_wind(None, Some(90.0), WindSpeedUnit::Kph, 1, WindDirectionStyle::Letters, &en),
        UNAVAILABLE
    );
}

#[test]
fn test_compass_is_periodic() {
    for deg in 0..360 {
        let d = deg as f64;
        let expected = ((d / 45.0).round() as usize) % 8;
        assert_eq!(compass_index(d), expected, "{} degrees", deg);
        assert_eq!(compass_index(d + 360.0), expected);
        assert_eq!(compass_index(d - 360.0), expected);
    }

    assert_eq!(format_wind_direction(Some(225.0), WindDirectionStyle::Letters), "SW");
    assert_eq!(format_wind_direction(Some(350.0), WindDirectionStyle::Letters), "N");
}

#[test]
fn test_beaufort_force_four_bounds() {
    assert_eq!(beaufort(5.4).force, 3);
    assert_eq!(beaufort(5.5).force, 4);
    assert_eq!(beaufort(7.9).force, 4);
    assert_eq!(beaufort(8.0).force, 5);
    assert_eq!(beaufort(4.5).force, 3);
    assert_eq!(beaufort(40.0).name, "Hurricane");
}

#[test]
fn test_pressure_in_german_locale() {
    let de = NumberLocale::from_tag("de_DE.UTF-8");
    assert_eq!(format_pressure(Some(1013.4), PressureUnit::Hpa, 1, &de), "1.013,4 hPa");
    assert_eq!(format_pressure(Some(1013.4), PressureUnit::InHg, 2, &de), "29,92 inHg");
}
