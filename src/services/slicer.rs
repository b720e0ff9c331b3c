use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::debug;

/// Errors raised while cutting a picture into puzzle cells.
#[derive(Debug, Error)]
pub enum SliceError {
    /// The grid does not fit the picture (or is empty).
    #[error("cannot cut a {width}x{height} picture into {rows}x{cols} pieces")]
    InvalidDimensions {
        /// Requested rows.
        rows: usize,
        /// Requested columns.
        cols: usize,
        /// Picture width in pixels (zero when unknown).
        width: u32,
        /// Picture height in pixels (zero when unknown).
        height: u32,
    },
    /// The source picture could not be read or decoded.
    #[error("image decode failed: {0}")]
    Decode(String),
    /// A cell could not be written.
    #[error("image encode failed: {0}")]
    Encode(String),
    /// The blocking slicing task died.
    #[error("slicing task failed: {0}")]
    Task(String),
}

/// Cells cut out of a picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicedPicture {
    /// Width in pixels of the area covered by the cells.
    pub width: u32,
    /// Height in pixels of the area covered by the cells.
    pub height: u32,
    /// One asset reference per cell, row by row.
    pub cells: Vec<Vec<String>>,
}

/// Cuts a picture into a grid of per-cell assets.
pub trait ImageSlicer: Send + Sync {
    /// Slice `source` into `rows` x `cols` cells.
    fn slice(
        &self,
        source: &Path,
        rows: usize,
        cols: usize,
    ) -> BoxFuture<'static, Result<SlicedPicture, SliceError>>;
}

/// [`ImageSlicer`] backed by the `image` crate.
///
/// Cells are written next to the source as `<stem>_<row>_<col>.png` and
/// referenced relative to `root`, so they can be served from there.
#[derive(Debug, Clone)]
pub struct ImageCrateSlicer {
    root: PathBuf,
}

impl ImageCrateSlicer {
    /// Build a slicer producing references relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageSlicer for ImageCrateSlicer {
    fn slice(
        &self,
        source: &Path,
        rows: usize,
        cols: usize,
    ) -> BoxFuture<'static, Result<SlicedPicture, SliceError>> {
        let root = self.root.clone();
        let source = source.to_path_buf();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || slice_blocking(&root, &source, rows, cols))
                .await
                .map_err(|err| SliceError::Task(err.to_string()))?
        })
    }
}

fn slice_blocking(
    root: &Path,
    source: &Path,
    rows: usize,
    cols: usize,
) -> Result<SlicedPicture, SliceError> {
    let invalid = |width, height| SliceError::InvalidDimensions {
        rows,
        cols,
        width,
        height,
    };
    if rows == 0 || cols == 0 {
        return Err(invalid(0, 0));
    }

    let picture = image::open(source).map_err(|err| SliceError::Decode(err.to_string()))?;
    let (width, height) = (picture.width(), picture.height());
    let (Ok(rows_px), Ok(cols_px)) = (u32::try_from(rows), u32::try_from(cols)) else {
        return Err(invalid(width, height));
    };
    // Remainder pixels on the right and bottom edges are dropped.
    let cell_width = width / cols_px;
    let cell_height = height / rows_px;
    if cell_width == 0 || cell_height == 0 {
        return Err(invalid(width, height));
    }

    let directory = source.parent().unwrap_or(root);
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "piece".into());

    let mut grid = Vec::with_capacity(rows);
    for row in 0..rows_px {
        let mut cells = Vec::with_capacity(cols);
        for col in 0..cols_px {
            let cell = picture.crop_imm(col * cell_width, row * cell_height, cell_width, cell_height);
            let path = directory.join(format!("{stem}_{row}_{col}.png"));
            cell.save(&path)
                .map_err(|err| SliceError::Encode(err.to_string()))?;
            cells.push(asset_reference(root, &path));
        }
        grid.push(cells);
    }

    debug!(
        source = %source.display(),
        rows,
        cols,
        cell_width,
        cell_height,
        "picture sliced"
    );
    Ok(SlicedPicture {
        width: cell_width * cols_px,
        height: cell_height * rows_px,
        cells: grid,
    })
}

fn asset_reference(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};
    use uuid::Uuid;

    use super::*;

    fn picture(width: u32, height: u32) -> (PathBuf, PathBuf) {
        let root = std::env::temp_dir().join(format!("jigsaw-slicer-{}", Uuid::new_v4()));
        let namespace = root.join("puzzle");
        std::fs::create_dir_all(&namespace).unwrap();
        let source = namespace.join("original.png");
        RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 0]))
            .save(&source)
            .unwrap();
        (root, source)
    }

    #[tokio::test]
    async fn slices_picture_into_row_major_cells() {
        let (root, source) = picture(9, 7);
        let slicer = ImageCrateSlicer::new(&root);

        let sliced = slicer.slice(&source, 2, 3).await.unwrap();

        assert_eq!((sliced.width, sliced.height), (9, 6));
        let grid = sliced.cells;
        assert_eq!(grid.len(), 2);
        assert!(grid.iter().all(|row| row.len() == 3));
        assert_eq!(grid[1][2], "puzzle/original_1_2.png");
        let cell = image::open(root.join(&grid[1][2])).unwrap();
        assert_eq!((cell.width(), cell.height()), (3, 3));

        std::fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn rejects_grids_finer_than_the_picture() {
        let (root, source) = picture(4, 4);
        let slicer = ImageCrateSlicer::new(&root);

        let err = slicer.slice(&source, 5, 1).await.unwrap_err();
        assert!(matches!(err, SliceError::InvalidDimensions { rows: 5, .. }));

        std::fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn missing_source_is_a_decode_error() {
        let slicer = ImageCrateSlicer::new(std::env::temp_dir());
        let err = slicer
            .slice(Path::new("/definitely/not/here.jpeg"), 2, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, SliceError::Decode(_)));
    }
}
