//! Region-of-interest macros over an image stack.

use std::fmt::Display;

use tracing::debug;

use crate::error::{Error, Result};
use crate::identifier::expression_safe_name;
use crate::map::{HdfMap, DEFAULT_IMAGE};

/// Macro definitions for a rectangular window centred on `(cen_i, cen_j)`
/// over the last two axes of `image`.
///
/// Centres are expression text, so they may name other datasets and are
/// evaluated per file. Half widths round down; the background box has twice
/// the half widths.
pub fn roi_macros(
    name: &str,
    cen_i: &str,
    cen_j: &str,
    wid_i: usize,
    wid_j: usize,
    image: &str,
) -> Vec<(String, String)> {
    let (hi, hj) = (wid_i / 2, wid_j / 2);
    let ci = format!("int({cen_i})");
    let cj = format!("int({cen_j})");
    let window = |h_i: usize, h_j: usize| {
        format!("d_{image}[..., max({ci} - {h_i}, 0):{ci} + {h_i}, max({cj} - {h_j}, 0):{cj} + {h_j}]")
    };
    let corners = |h_i: usize, h_j: usize| {
        format!(
            "(({ci} - {h_i}, {cj} - {h_j}), ({ci} - {h_i}, {cj} + {h_j}), \
             ({ci} + {h_i}, {cj} + {h_j}), ({ci} + {h_i}, {cj} - {h_j}))"
        )
    };
    let outer = window(2 * hi, 2 * hj);
    vec![
        (name.to_string(), window(hi, hj)),
        (format!("{name}_total"), format!("np.sum({name}, axis=(-1, -2))")),
        (format!("{name}_max"), format!("np.max({name}, axis=(-1, -2))")),
        (format!("{name}_min"), format!("np.min({name}, axis=(-1, -2))")),
        (format!("{name}_mean"), format!("np.mean({name}, axis=(-1, -2))")),
        (
            format!("{name}_bkg"),
            format!(
                "(np.sum({outer}, axis=(-1, -2)) - {name}_total) / (np.size({outer}) - np.size({name})) * np.size({name})"
            ),
        ),
        (format!("{name}_rmbkg"), format!("{name}_total - {name}_bkg")),
        (format!("{name}_box"), corners(hi, hj)),
        (format!("{name}_bkg_box"), corners(2 * hi, 2 * hj)),
    ]
}

impl HdfMap {
    /// Register the ROI macro family `name`, `name_total`, `name_max`,
    /// `name_min`, `name_mean`, `name_bkg`, `name_rmbkg`, `name_box` and
    /// `name_bkg_box` over `image` (default `IMAGE`).
    pub fn add_roi(
        &mut self,
        name: &str,
        cen_i: impl Display,
        cen_j: impl Display,
        wid_i: usize,
        wid_j: usize,
        image: Option<&str>,
    ) -> Result<()> {
        let image = image.unwrap_or(DEFAULT_IMAGE);
        if image.is_empty() || expression_safe_name(image) != image {
            return Err(Error::InvalidName(image.to_string()));
        }
        let macros = roi_macros(name, &cen_i.to_string(), &cen_j.to_string(), wid_i, wid_j, image);
        debug!(name, image, wid_i, wid_j, "adding roi");
        self.add_named_expressions(macros)
    }
}
