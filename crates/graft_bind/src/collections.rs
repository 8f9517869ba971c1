//! Owned container types with document-level semantics the standard
//! library does not model: numeric arrays with a non-zero lower bound and
//! rectangular rank-2 arrays.

// -----------------------------------------------------------------------------
// BoundedArray

/// A numeric-indexed array whose first index may differ from zero.
///
/// The lower bound travels with the document (as a reserved attribute,
/// `lb` by default), so a round trip preserves both the items and the
/// index base.
///
/// # Examples
///
/// ```
/// use graft_bind::collections::BoundedArray;
///
/// let mut arr = BoundedArray::with_lower_bound(10);
/// arr.push("a");
/// arr.push("b");
///
/// assert_eq!(arr.get(10), Some(&"a"));
/// assert_eq!(arr.get(11), Some(&"b"));
/// assert_eq!(arr.get(9), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BoundedArray<T> {
    lower: i64,
    items: Vec<T>,
}

impl<T> BoundedArray<T> {
    /// Creates an empty array with lower bound zero.
    #[inline]
    pub fn new() -> Self {
        Self::with_lower_bound(0)
    }

    /// Creates an empty array with the given lower bound.
    #[inline]
    pub fn with_lower_bound(lower: i64) -> Self {
        Self {
            lower,
            items: Vec::new(),
        }
    }

    /// Returns the first valid index.
    #[inline]
    pub fn lower_bound(&self) -> i64 {
        self.lower
    }

    /// Rebases the array on a new lower bound. Items keep their order;
    /// their indices shift.
    #[inline]
    pub fn set_lower_bound(&mut self, lower: i64) {
        self.lower = lower;
    }

    /// Appends an item at the next index.
    #[inline]
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Returns the item at the given absolute index.
    pub fn get(&self, index: i64) -> Option<&T> {
        let offset = index.checked_sub(self.lower)?;
        usize::try_from(offset).ok().and_then(|i| self.items.get(i))
    }

    /// Number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the array holds no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates items in index order.
    #[inline]
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.items.iter()
    }
}

// -----------------------------------------------------------------------------
// Grid

/// A rectangular rank-2 array stored row-major.
///
/// In a document a grid is encoded as rows of items; it only materializes
/// as a `Grid` once every row has fully materialized, and ragged input is
/// rejected.
///
/// # Examples
///
/// ```
/// use graft_bind::collections::Grid;
///
/// let grid = Grid::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
/// assert_eq!(grid.rows(), 2);
/// assert_eq!(grid.cols(), 3);
/// assert_eq!(grid.get(1, 2), Some(&6));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T> Grid<T> {
    /// Builds a grid from nested rows.
    ///
    /// Returns `Err` with the offending row index if the rows are not all
    /// the same length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, usize> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        let row_count = rows.len();
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != cols {
                return Err(i);
            }
            data.extend(row);
        }
        Ok(Self {
            rows: row_count,
            cols,
            data,
        })
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns the item at the given row and column.
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// Iterates the rows as slices.
    #[inline]
    pub fn row_slices(&self) -> impl Iterator<Item = &[T]> {
        self.data.chunks(self.cols.max(1)).take(self.rows)
    }
}

impl<T: Clone> Grid<T> {
    /// Clones the grid back into nested rows.
    pub fn to_rows(&self) -> Vec<Vec<T>> {
        self.row_slices().map(<[T]>::to_vec).collect()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_indexing() {
        let mut arr = BoundedArray::with_lower_bound(-2);
        arr.push(1);
        arr.push(2);
        arr.push(3);

        assert_eq!(arr.get(-2), Some(&1));
        assert_eq!(arr.get(0), Some(&3));
        assert_eq!(arr.get(1), None);
        assert_eq!(arr.lower_bound(), -2);
    }

    #[test]
    fn grid_rejects_ragged_rows() {
        assert_eq!(Grid::from_rows(vec![vec![1, 2], vec![3]]), Err(1));
    }

    #[test]
    fn grid_round_trips_rows() {
        let rows = vec![vec![1, 2], vec![3, 4], vec![5, 6]];
        let grid = Grid::from_rows(rows.clone()).unwrap();
        assert_eq!(grid.to_rows(), rows);
    }

    #[test]
    fn empty_grid() {
        let grid = Grid::<i32>::from_rows(vec![]).unwrap();
        assert_eq!(grid.rows(), 0);
        assert_eq!(grid.cols(), 0);
        assert_eq!(grid.get(0, 0), None);
    }
}
