// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Image primitives (C1): the `ImageTriplet` entity and its pixel-wise
 * arithmetic.
 */

use ndarray::Array2;

use crate::error::{CalError, CalResult};

/// Three aligned 2-D planes: science, uncertainty (1 sigma) and data-quality.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTriplet {
    pub sci: Array2<f64>,
    pub err: Array2<f64>,
    pub dq: Array2<u16>,
}

impl ImageTriplet {
    /// Build a triplet of the given shape, all pixels zeroed.
    pub fn zeros(ny: usize, nx: usize) -> Self {
        ImageTriplet {
            sci: Array2::zeros((ny, nx)),
            err: Array2::zeros((ny, nx)),
            dq: Array2::zeros((ny, nx)),
        }
    }

    pub fn nx(&self) -> usize {
        self.sci.ncols()
    }

    pub fn ny(&self) -> usize {
        self.sci.nrows()
    }

    fn check_same_shape(&self, other: &ImageTriplet) -> CalResult<()> {
        if self.sci.dim() != other.sci.dim() {
            let (ny, nx) = self.sci.dim();
            let (oy, ox) = other.sci.dim();
            return Err(CalError::SizeMismatch {
                sci_nx: nx,
                sci_ny: ny,
                ref_nx: ox,
                ref_ny: oy,
            });
        }
        Ok(())
    }

    /// `self += other`, combining err in quadrature and dq by OR.
    pub fn add(&mut self, other: &ImageTriplet) -> CalResult<()> {
        self.check_same_shape(other)?;
        self.sci += &other.sci;
        combine_err_quadrature(&mut self.err, &other.err);
        or_dq(&mut self.dq, &other.dq);
        Ok(())
    }

    /// `self -= other`, combining err in quadrature and dq by OR.
    pub fn sub(&mut self, other: &ImageTriplet) -> CalResult<()> {
        self.check_same_shape(other)?;
        self.sci -= &other.sci;
        combine_err_quadrature(&mut self.err, &other.err);
        or_dq(&mut self.dq, &other.dq);
        Ok(())
    }

    /// `self *= other`, with `err = sqrt((a*sigb)^2 + (b*siga)^2)`.
    pub fn mul(&mut self, other: &ImageTriplet) -> CalResult<()> {
        self.check_same_shape(other)?;
        ndarray::Zip::from(&mut self.err)
            .and(&self.sci)
            .and(&other.sci)
            .and(&other.err)
            .for_each(|e, &a, &b, &sb| {
                let sa = *e;
                *e = ((a * sb).powi(2) + (b * sa).powi(2)).sqrt();
            });
        self.sci *= &other.sci;
        or_dq(&mut self.dq, &other.dq);
        Ok(())
    }

    /// `self /= other`. Wherever `other.sci == 0`, `self.sci` is left
    /// unchanged and `CALIBDEFECT` is OR'd into `self.dq` instead of
    /// computing a quotient (§3, §4.1).
    pub fn div(&mut self, other: &ImageTriplet) -> CalResult<()> {
        self.check_same_shape(other)?;
        ndarray::Zip::from(&mut self.sci)
            .and(&mut self.err)
            .and(&mut self.dq)
            .and(&other.sci)
            .and(&other.err)
            .for_each(|a, siga, dqv, &b, &sigb| {
                if b == 0.0 {
                    *dqv |= crate::dq::CALIBDEFECT;
                } else {
                    let new_err = (*siga / b.abs()).powi(2) + (*a * sigb / (b * b)).powi(2);
                    *a /= b;
                    *siga = new_err.sqrt();
                }
            });
        or_dq(&mut self.dq, &other.dq);
        Ok(())
    }

    /// Scale `sci` and `err` by a constant; `dq` is unaffected.
    pub fn scale_by_constant(&mut self, k: f64) {
        self.sci *= k;
        self.err *= k.abs();
    }

    /// DQ-only combine: `self.dq |= other.dq`.
    pub fn or_dq(&mut self, other: &ImageTriplet) -> CalResult<()> {
        self.check_same_shape(other)?;
        or_dq(&mut self.dq, &other.dq);
        Ok(())
    }

    /// Like `add`, but skips a reference-pixel border of the given widths
    /// (`trimx[0..3]` columns from each edge pair, `trimy[0..1]` rows),
    /// leaving the border untouched. See §4.1.
    pub fn add_interior(&mut self, other: &ImageTriplet, border: Border) -> CalResult<()> {
        self.combine_interior(other, border, CombineOp::Add)
    }

    /// Like `sub`, skipping the reference-pixel border.
    pub fn sub_interior(&mut self, other: &ImageTriplet, border: Border) -> CalResult<()> {
        self.combine_interior(other, border, CombineOp::Sub)
    }

    fn combine_interior(
        &mut self,
        other: &ImageTriplet,
        border: Border,
        op: CombineOp,
    ) -> CalResult<()> {
        self.check_same_shape(other)?;
        let (ny, nx) = self.sci.dim();
        let (x0, x1) = (border.left, nx.saturating_sub(border.right));
        let (y0, y1) = (border.bottom, ny.saturating_sub(border.top));
        for j in y0..y1.max(y0) {
            for i in x0..x1.max(x0) {
                let b_sci = other.sci[[j, i]];
                let b_err = other.err[[j, i]];
                let a_err = self.err[[j, i]];
                match op {
                    CombineOp::Add => self.sci[[j, i]] += b_sci,
                    CombineOp::Sub => self.sci[[j, i]] -= b_sci,
                }
                self.err[[j, i]] = (a_err * a_err + b_err * b_err).sqrt();
                self.dq[[j, i]] |= other.dq[[j, i]];
            }
        }
        Ok(())
    }
}

enum CombineOp {
    Add,
    Sub,
}

/// A reference-pixel border width: `left`/`right` from `trimx[0..3]`,
/// `bottom`/`top` from `trimy[0..1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Border {
    pub left: usize,
    pub right: usize,
    pub bottom: usize,
    pub top: usize,
}

fn combine_err_quadrature(a: &mut Array2<f64>, b: &Array2<f64>) {
    ndarray::Zip::from(a).and(b).for_each(|e, &be| {
        *e = (*e * *e + be * be).sqrt();
    });
}

fn or_dq(a: &mut Array2<u16>, b: &Array2<u16>) {
    ndarray::Zip::from(a).and(b).for_each(|d, &bd| {
        *d |= bd;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(ny: usize, nx: usize, sci: f64, err: f64, dq: u16) -> ImageTriplet {
        ImageTriplet {
            sci: Array2::from_elem((ny, nx), sci),
            err: Array2::from_elem((ny, nx), err),
            dq: Array2::from_elem((ny, nx), dq),
        }
    }

    #[test]
    fn add_combines_err_in_quadrature_and_dq_by_or() {
        let mut a = constant(2, 2, 1.0, 3.0, 0b01);
        let b = constant(2, 2, 2.0, 4.0, 0b10);
        a.add(&b).unwrap();
        assert_eq!(a.sci[[0, 0]], 3.0);
        assert_eq!(a.err[[0, 0]], 5.0); // 3-4-5 triangle
        assert_eq!(a.dq[[0, 0]], 0b11);
    }

    #[test]
    fn div_by_zero_flags_calibdefect_and_leaves_sci_unchanged() {
        let mut a = constant(1, 1, 7.0, 1.0, 0);
        let b = constant(1, 1, 0.0, 0.0, 0);
        a.div(&b).unwrap();
        assert_eq!(a.sci[[0, 0]], 7.0);
        assert!(a.dq[[0, 0]] & crate::dq::CALIBDEFECT != 0);
    }

    #[test]
    fn div_combines_err_per_quotient_rule() {
        let mut a = constant(1, 1, 10.0, 1.0, 0);
        let b = constant(1, 1, 2.0, 0.5, 0);
        a.div(&b).unwrap();
        assert_eq!(a.sci[[0, 0]], 5.0);
        let expected = ((1.0f64 / 2.0).powi(2) + (10.0 * 0.5 / 4.0).powi(2)).sqrt();
        assert!((a.err[[0, 0]] - expected).abs() < 1e-12);
    }

    #[test]
    fn shape_mismatch_is_a_hard_failure() {
        let mut a = constant(2, 2, 1.0, 1.0, 0);
        let b = constant(3, 3, 1.0, 1.0, 0);
        let err = a.add(&b).unwrap_err();
        assert_eq!(err.code(), 120);
    }

    #[test]
    fn scale_by_constant_leaves_dq_untouched() {
        let mut a = constant(1, 1, 2.0, 1.0, 0xFF);
        a.scale_by_constant(3.0);
        assert_eq!(a.sci[[0, 0]], 6.0);
        assert_eq!(a.err[[0, 0]], 3.0);
        assert_eq!(a.dq[[0, 0]], 0xFF);
    }

    #[test]
    fn interior_combine_skips_the_border() {
        let mut a = constant(4, 4, 0.0, 0.0, 0);
        let b = constant(4, 4, 1.0, 0.0, 1);
        a.add_interior(
            &b,
            Border {
                left: 1,
                right: 1,
                bottom: 1,
                top: 1,
            },
        )
        .unwrap();
        // Border pixels untouched.
        assert_eq!(a.sci[[0, 0]], 0.0);
        assert_eq!(a.dq[[0, 0]], 0);
        // Interior pixels combined.
        assert_eq!(a.sci[[1, 1]], 1.0);
        assert_eq!(a.dq[[1, 1]], 1);
    }
}
