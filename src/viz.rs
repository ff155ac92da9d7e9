//! Post-processing and terminal visualization of simulation histories.

use ndarray::Array2;

use crate::error::{shape_of, Result, SlsError};

/// Apply `mat` to every column of a time-indexed history.
///
/// Histories store one vector per time step as a column, so this is the
/// per-step product `mat * history[:, t]` for all `t`, e.g. turning an
/// actuation history $u_t$ into the applied actuation $B_2 u_t$.
///
/// # Examples
/// ```
/// use ndarray::array;
/// use sls_sim::viz::matrix_series_product;
///
/// let b2_mat = array![[1., 0.], [0., 2.]];
/// let inputs = array![[1., 0.], [1., 3.]];
/// let applied = matrix_series_product(&b2_mat, &inputs).unwrap();
/// assert_eq!(applied, array![[1., 0.], [2., 6.]]);
/// ```
pub fn matrix_series_product(mat: &Array2<f64>, series: &Array2<f64>) -> Result<Array2<f64>> {
    if mat.ncols() != series.nrows() {
        return Err(SlsError::DimensionMismatch {
            name: "history",
            expected: format!("{} rows", mat.ncols()),
            actual: shape_of(series.nrows(), series.ncols()),
        });
    }
    Ok(mat.dot(series))
}

const RAMP: &[u8] = b" .:-=+*#%@";
const LOG_FLOOR: f64 = 1e-4;

/// Render two histories side by side as a log-magnitude heat map.
///
/// Rows are vector indices, columns are time steps, and each cell shows
/// $\log_{10}\lvert v \rvert$ mapped onto a character ramp. Both panels
/// share one scale: anything at or below the floor magnitude of `1e-4`
/// renders blank, the largest magnitude across both histories renders
/// `@`. The returned string carries a trailing newline per row and no
/// terminal escapes, so it can go straight to stdout or a log file.
pub fn heat_map(states: &Array2<f64>, actuation: &Array2<f64>, title: &str) -> String {
    let log_floor = LOG_FLOOR.log10();
    let peak = states
        .iter()
        .chain(actuation.iter())
        .map(|v| v.abs())
        .fold(LOG_FLOOR, f64::max);
    let log_peak = peak.log10();

    let mut out = String::new();
    out.push_str(title);
    out.push('\n');
    out.push_str(&panel_header("x", states.ncols()));
    out.push_str(&panel_header("B2 u", actuation.ncols()));
    out.push('\n');

    let rows = states.nrows().max(actuation.nrows());
    for i in 0..rows {
        render_panel_row(&mut out, states, i, log_floor, log_peak);
        out.push_str("  ");
        render_panel_row(&mut out, actuation, i, log_floor, log_peak);
        out.push('\n');
    }
    out
}

fn panel_header(label: &str, width: usize) -> String {
    format!("{label:<width$}", width = width + 2)
}

fn render_panel_row(
    out: &mut String,
    history: &Array2<f64>,
    row: usize,
    log_floor: f64,
    log_peak: f64,
) {
    if row >= history.nrows() {
        out.extend(std::iter::repeat(' ').take(history.ncols()));
        return;
    }
    for &value in history.row(row) {
        out.push(render_cell(value, log_floor, log_peak));
    }
}

fn render_cell(value: f64, log_floor: f64, log_peak: f64) -> char {
    let magnitude = value.abs();
    if magnitude <= LOG_FLOOR || log_peak <= log_floor {
        return RAMP[0] as char;
    }
    let norm = (magnitude.log10() - log_floor) / (log_peak - log_floor);
    let index = (norm.clamp(0.0, 1.0) * (RAMP.len() - 1) as f64).round() as usize;
    RAMP[index] as char
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_series_product() {
        let mat = array![[0., 1.], [1., 0.], [1., 1.]];
        let series = array![[1., 2., 3.], [4., 5., 6.]];
        let product = matrix_series_product(&mat, &series).unwrap();
        assert_eq!(product, array![[4., 5., 6.], [1., 2., 3.], [5., 7., 9.]]);
    }

    #[test]
    fn test_series_product_dimension_check() {
        let mat = array![[1., 0.]];
        let series = array![[1.], [2.], [3.]];
        assert!(matrix_series_product(&mat, &series).is_err());
    }

    #[test]
    fn test_heat_map_layout() {
        let states = array![[10., 0.], [0., 0.01]];
        let actuation = array![[0., 10.], [0., 0.]];
        let rendered = heat_map(&states, &actuation, "Centralized");

        let lines: Vec<_> = rendered.lines().collect();
        // title, header, one line per state row
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Centralized");
        // peak magnitude maps to the top of the ramp, zeros stay blank
        assert_eq!(lines[2], "@    @");
        assert_eq!(lines[3], " =    ");
    }

    #[test]
    fn test_heat_map_all_zero() {
        let states = Array2::zeros((2, 3));
        let actuation = Array2::zeros((2, 3));
        let rendered = heat_map(&states, &actuation, "quiet");
        for line in rendered.lines().skip(2) {
            assert!(line.chars().all(|c| c == ' '));
        }
    }

    #[test]
    fn test_heat_map_uneven_panels() {
        let states = array![[1.], [1.], [1.]];
        let actuation = array![[1.]];
        let rendered = heat_map(&states, &actuation, "t");
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines.len(), 5);
    }
}
