// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * The RAZ (readout-direction array) reorder shared by sink-pixel flagging
 * (C8) and the CTE model (C9): rearrange the four amplifier quadrants into
 * a single array with amps side-by-side in readout order C, D, A, B, and
 * readout direction as increasing row index (§6, §9 glossary).
 */

use ndarray::Array2;

use crate::geometry::Amp;

/// `raz(x)` followed by `undo_raz` must be a bijection: `undo_raz(raz(x))
/// == x` pointwise (§8).
pub fn raz(quadrants: &[(Amp, Array2<f64>)]) -> Array2<f64> {
    let quad_w = quadrants[0].1.ncols();
    let quad_h = quadrants[0].1.nrows();
    let mut out = Array2::zeros((quad_h, 4 * quad_w));
    for (amp, data) in quadrants {
        let col_offset = readout_order_index(*amp) * quad_w;
        for y in 0..quad_h {
            for x in 0..quad_w {
                out[[y, col_offset + x]] = data[[y, x]];
            }
        }
    }
    out
}

/// Inverse of `raz`: split the RAZ array back into its four per-amp
/// quadrants, keyed by amp.
pub fn undo_raz(amps: &[Amp], raz_array: &Array2<f64>) -> Vec<(Amp, Array2<f64>)> {
    let quad_w = raz_array.ncols() / 4;
    let quad_h = raz_array.nrows();
    amps.iter()
        .map(|&amp| {
            let col_offset = readout_order_index(amp) * quad_w;
            let mut out = Array2::zeros((quad_h, quad_w));
            for y in 0..quad_h {
                for x in 0..quad_w {
                    out[[y, x]] = raz_array[[y, col_offset + x]];
                }
            }
            (amp, out)
        })
        .collect()
}

/// The fixed RAZ column order: C, D, A, B (§6).
fn readout_order_index(amp: Amp) -> usize {
    match amp {
        Amp::C => 0,
        Amp::D => 1,
        Amp::A => 2,
        Amp::B => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raz_then_undo_is_the_identity() {
        let quads: Vec<(Amp, Array2<f64>)> = vec![
            (Amp::A, Array2::from_elem((4, 3), 1.0)),
            (Amp::B, Array2::from_elem((4, 3), 2.0)),
            (Amp::C, Array2::from_elem((4, 3), 3.0)),
            (Amp::D, Array2::from_elem((4, 3), 4.0)),
        ];
        let razzed = raz(&quads);
        let amps: Vec<Amp> = quads.iter().map(|(a, _)| *a).collect();
        let restored = undo_raz(&amps, &razzed);
        for (amp, original) in &quads {
            let back = restored.iter().find(|(a, _)| a == amp).unwrap();
            assert_eq!(&back.1, original);
        }
    }

    #[test]
    fn columns_are_ordered_c_d_a_b() {
        let quads: Vec<(Amp, Array2<f64>)> = vec![
            (Amp::A, Array2::from_elem((1, 2), 10.0)),
            (Amp::B, Array2::from_elem((1, 2), 20.0)),
            (Amp::C, Array2::from_elem((1, 2), 30.0)),
            (Amp::D, Array2::from_elem((1, 2), 40.0)),
        ];
        let razzed = raz(&quads);
        assert_eq!(razzed[[0, 0]], 30.0); // C
        assert_eq!(razzed[[0, 2]], 40.0); // D
        assert_eq!(razzed[[0, 4]], 10.0); // A
        assert_eq!(razzed[[0, 6]], 20.0); // B
    }
}
