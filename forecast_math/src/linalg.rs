//! Dense least-squares helpers
//!
//! Design matrices here are small (a handful of lags or changepoints), so
//! the normal equations are solved directly with partial pivoting.

use crate::{MathError, Result};

/// Solve `a * x = b` in place for a square system using Gaussian elimination
/// with partial pivoting.
pub fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(format!(
            "Expected a {}x{} system",
            n, n
        )));
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);

        if a[pivot][col].abs() < 1e-12 {
            return Err(MathError::CalculationError(
                "Singular matrix in linear solve".to_string(),
            ));
        }

        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    Ok(x)
}

/// Ordinary (or ridge, when `ridge > 0`) least squares.
///
/// `rows` holds one feature vector per observation. When `intercept` is set
/// a constant column is prepended and left unpenalised; the returned
/// coefficients then start with the intercept.
pub fn least_squares(rows: &[Vec<f64>], y: &[f64], ridge: f64, intercept: bool) -> Result<Vec<f64>> {
    if rows.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Design matrix has {} rows but target has {} values",
            rows.len(),
            y.len()
        )));
    }
    if ridge < 0.0 {
        return Err(MathError::InvalidInput(
            "Ridge penalty must be non-negative".to_string(),
        ));
    }

    let features = rows.first().map(|r| r.len()).unwrap_or(0);
    let k = features + usize::from(intercept);
    if k == 0 {
        return Ok(Vec::new());
    }
    if rows.len() < k && ridge == 0.0 {
        return Err(MathError::InsufficientData(format!(
            "Need at least {} observations for {} coefficients",
            k, k
        )));
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    let mut design = Vec::with_capacity(k);

    for (row, &target) in rows.iter().zip(y) {
        if row.len() != features {
            return Err(MathError::InvalidInput(
                "Design matrix rows have inconsistent lengths".to_string(),
            ));
        }
        design.clear();
        if intercept {
            design.push(1.0);
        }
        design.extend_from_slice(row);

        for i in 0..k {
            xty[i] += design[i] * target;
            for j in i..k {
                xtx[i][j] += design[i] * design[j];
            }
        }
    }

    for i in 0..k {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }

    let first_penalised = usize::from(intercept);
    for (i, row) in xtx.iter_mut().enumerate().skip(first_penalised) {
        row[i] += ridge;
    }

    solve(xtx, xty)
}

/// Dot product of a coefficient vector (optionally intercept-first) with features
pub fn predict_linear(coefficients: &[f64], features: &[f64], intercept: bool) -> f64 {
    if intercept {
        let (bias, weights) = coefficients.split_first().unwrap_or((&0.0, &[]));
        bias + weights.iter().zip(features).map(|(w, x)| w * x).sum::<f64>()
    } else {
        coefficients.iter().zip(features).map(|(w, x)| w * x).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_solve_two_by_two() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let x = solve(a, vec![3.0, 5.0]).unwrap();
        assert_abs_diff_eq!(x[0], 0.8, epsilon = 1e-10);
        assert_abs_diff_eq!(x[1], 1.4, epsilon = 1e-10);
    }

    #[test]
    fn test_solve_singular() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(solve(a, vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_least_squares_recovers_line() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..20).map(|i| 3.0 + 2.0 * i as f64).collect();
        let coef = least_squares(&rows, &y, 0.0, true).unwrap();
        assert_abs_diff_eq!(coef[0], 3.0, epsilon = 1e-8);
        assert_abs_diff_eq!(coef[1], 2.0, epsilon = 1e-8);
        assert_abs_diff_eq!(predict_linear(&coef, &[10.0], true), 23.0, epsilon = 1e-8);
    }

    #[test]
    fn test_ridge_shrinks_slope() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..20).map(|i| 2.0 * i as f64).collect();
        let ols = least_squares(&rows, &y, 0.0, false).unwrap();
        let ridge = least_squares(&rows, &y, 500.0, false).unwrap();
        assert!(ridge[0].abs() < ols[0].abs());
    }

    #[test]
    fn test_least_squares_length_mismatch() {
        let rows = vec![vec![1.0], vec![2.0]];
        assert!(least_squares(&rows, &[1.0], 0.0, true).is_err());
    }
}
