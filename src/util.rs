pub fn remap_value_clamped(val: f64, in_low: f64, in_high: f64, out_low: f64, out_high: f64) -> f64 {
    if in_high <= in_low {
        return if val < in_high { out_low } else { out_high };
    }

    let clamped_val = val.clamp(in_low, in_high);

    let interpolated = (clamped_val - in_low) / (in_high - in_low);
    let clamped = interpolated.clamp(0.0, 1.0);

    clamped * out_high + (1.0 - clamped) * out_low
}

// Splits a "lat, lon" string. Either half that doesn't parse comes back as None, same as a coerced column.
pub fn split_location(game_loc: &str) -> (Option<f64>, Option<f64>) {
    let mut parts = game_loc.splitn(2, ',');
    let lat = parts.next().and_then(parse_finite);
    let lon = parts.next().and_then(parse_finite);
    (lat, lon)
}

pub fn parse_finite(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
