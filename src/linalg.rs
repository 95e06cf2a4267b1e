use nalgebra::{Cholesky, DMatrix, Dyn};

/// Squared Cholesky pivot, relative to the largest diagonal entry, below which a Gram
/// matrix is treated as singular.
pub const SINGULAR_EPS: f64 = 1e-12;

/// Least-squares fit of every column of `y` on `x`.
#[derive(Debug, Clone)]
pub struct OlsFit {
    /// `x.ncols() x y.ncols()` coefficients.
    pub coef: DMatrix<f64>,
    pub resid: DMatrix<f64>,
    /// `(X'X)^-1`, kept for standard errors.
    pub xtx_inv: DMatrix<f64>,
}

fn spd_cholesky(m: DMatrix<f64>) -> Option<Cholesky<f64, Dyn>> {
    let max_diag = m.diagonal().iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if !max_diag.is_finite() || max_diag == 0.0 {
        return None;
    }
    let chol = m.cholesky()?;
    let min_pivot_sq = chol
        .l_dirty()
        .diagonal()
        .iter()
        .fold(f64::INFINITY, |acc, v| acc.min(v * v));
    if !min_pivot_sq.is_finite() || min_pivot_sq < SINGULAR_EPS * max_diag {
        return None;
    }
    Some(chol)
}

pub fn ols(y: &DMatrix<f64>, x: &DMatrix<f64>) -> Option<OlsFit> {
    if x.nrows() != y.nrows() || x.nrows() <= x.ncols() {
        return None;
    }
    let xt = x.transpose();
    let chol = spd_cholesky(&xt * x)?;
    let coef = chol.solve(&(&xt * y));
    let resid = y - x * &coef;
    if coef.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let xtx_inv = chol.inverse();
    Some(OlsFit {
        coef,
        resid,
        xtx_inv,
    })
}

/// Residuals of `y` after projecting out `x`; `y` itself when `x` has no columns.
pub fn residualize(y: &DMatrix<f64>, x: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if x.ncols() == 0 {
        return Some(y.clone());
    }
    ols(y, x).map(|f| f.resid)
}

/// `ln det` of a symmetric positive-definite matrix.
pub fn log_det_spd(m: &DMatrix<f64>) -> Option<f64> {
    let chol = spd_cholesky(m.clone())?;
    let ld = chol.l().diagonal().iter().map(|v| v.ln()).sum::<f64>() * 2.0;
    ld.is_finite().then_some(ld)
}

/// Lower Cholesky factor of an SPD matrix.
pub fn cholesky_lower(m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    spd_cholesky(m.clone()).map(|c| c.l())
}

pub fn spd_inverse(m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    spd_cholesky(m.clone()).map(|c| c.inverse())
}

/// Build a `rows x cols` matrix from row-major slices.
pub fn matrix_from_rows(rows: &[Vec<f64>], cols: usize) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), cols, |i, j| rows[i][j])
}

/// Horizontally stack blocks with the same row count. Empty blocks are skipped.
pub fn hstack(blocks: &[&DMatrix<f64>]) -> DMatrix<f64> {
    let nrows = blocks
        .iter()
        .find(|b| b.ncols() > 0)
        .map(|b| b.nrows())
        .unwrap_or(0);
    let ncols = blocks.iter().map(|b| b.ncols()).sum();
    let mut out = DMatrix::zeros(nrows, ncols);
    let mut offset = 0;
    for b in blocks {
        if b.ncols() == 0 {
            continue;
        }
        out.view_mut((0, offset), (nrows, b.ncols())).copy_from(*b);
        offset += b.ncols();
    }
    out
}
