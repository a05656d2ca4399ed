//! 256-entry threshold tables for the non-linear stretches.
//!
//! Entry `j` holds the lowest data value that maps to display level `j`; the
//! last entry is `f64::MAX` so every finite value finds a slot.

pub(crate) type Table = [f64; 256];

/// Largest display level. 255 is reserved for blank pixels.
pub(crate) const MAX_LEVEL: u8 = 254;

pub(crate) fn log_table(low: f64, sdiff: f64) -> Table {
    build(|j| {
        let a = 10f64.powf(j / 254.0);
        (a - 1.0) / 9.0 * sdiff + low
    })
}

pub(crate) fn log_log_table(low: f64, sdiff: f64) -> Table {
    build(|j| {
        let a = 10f64.powf((10f64.powf(j / 254.0) - 1.0) / 9.0);
        (a - 1.0) / 9.0 * sdiff + low
    })
}

pub(crate) fn squared_table(low: f64, sdiff: f64) -> Table {
    build(|j| (sdiff * sdiff / 254.0 * j).sqrt() + low)
}

pub(crate) fn sqrt_table(low: f64, sdiff: f64) -> Table {
    build(|j| {
        let d = sdiff.sqrt() / 254.0 * j;
        d * d + low
    })
}

fn build(entry: impl Fn(f64) -> f64) -> Table {
    let mut table = [0.0; 256];
    for (j, slot) in table.iter_mut().take(255).enumerate() {
        *slot = entry(j as f64);
    }
    table[255] = f64::MAX;
    table
}

/// Display level of `value`: the largest `j` with `table[j] < value`, or 0.
///
/// Tables built from reversed bounds run downhill; for those the level is the
/// number of leading entries at or above `value`, less one.
#[inline]
pub(crate) fn lookup(table: &Table, value: f64, descending: bool) -> u8 {
    let level = if descending {
        table[..255].partition_point(|&t| t >= value)
    } else {
        table.partition_point(|&t| t < value)
    };
    level.saturating_sub(1).min(MAX_LEVEL as usize) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The seven-step halving descent used by older renderers.
    fn halving_lookup(table: &Table, value: f64) -> u8 {
        let mut level: i32 = 128;
        let mut delta: i32 = 64;
        for _ in 0..7 {
            if table[level as usize] < value {
                level += delta;
            } else {
                level -= delta;
            }
            delta >>= 1;
        }
        if table[level as usize] >= value {
            level -= 1;
        }
        level.clamp(0, MAX_LEVEL as i32) as u8
    }

    #[test]
    fn test_lookup_matches_halving_descent() {
        let tables = [
            log_table(10.0, 500.0),
            log_log_table(-3.0, 40.0),
            squared_table(0.0, 1000.0),
            sqrt_table(5.0, 95.0),
        ];
        for table in &tables {
            let lo = table[0] - 10.0;
            let hi = table[254] + 10.0;
            for step in 0..=2000 {
                let v = lo + (hi - lo) * step as f64 / 2000.0;
                assert_eq!(lookup(table, v, false), halving_lookup(table, v), "v={}", v);
            }
            // Exact table entries are the edge cases.
            for &v in &table[..255] {
                assert_eq!(lookup(table, v, false), halving_lookup(table, v), "v={}", v);
            }
        }
    }

    #[test]
    fn test_lookup_endpoints() {
        let table = log_table(0.0, 100.0);
        assert_eq!(lookup(&table, -1.0, false), 0);
        assert_eq!(lookup(&table, 0.0, false), 0);
        assert_eq!(lookup(&table, 100.0, false), 253);
        assert_eq!(lookup(&table, 100.5, false), 254);
        assert_eq!(lookup(&table, 1.0e300, false), 254);
    }

    #[test]
    fn test_descending_lookup_is_monotone() {
        let table = sqrt_table(100.0, -100.0);
        let mut previous = 0;
        for step in 0..=100 {
            let v = 100.0 - step as f64;
            let level = lookup(&table, v, true);
            assert!(level >= previous, "v={} level={} previous={}", v, level, previous);
            previous = level;
        }
        assert_eq!(lookup(&table, 100.0, true), 0);
        assert_eq!(lookup(&table, 0.0, true), 254);
    }

    #[test]
    fn test_table_end_points() {
        let table = squared_table(2.0, 8.0);
        assert_eq!(table[0], 2.0);
        assert!((table[254] - 10.0).abs() < 1e-9);
        assert_eq!(table[255], f64::MAX);
    }
}
