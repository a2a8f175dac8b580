//! Point quadtree over a fixed bounding square.
//!
//! Leaf buckets hold a handful of items; once a bucket outgrows its capacity
//! the node splits into four quadrant children and redistributes. Splitting
//! stops at a depth cap, below which buckets simply grow, so any number of
//! items may share one coordinate.

use mapclust_types::geometry::{Bounds, Point};
use smallvec::SmallVec;

/// Items stored in a [`QuadTree`] expose the projected point they are
/// indexed at. The point must stay fixed while the item is in the tree;
/// removal descends by it.
pub trait SpatialItem {
    fn point(&self) -> Point;
}

/// Bucket size beyond which a node splits.
const NODE_CAPACITY: usize = 32;

/// Maximum tree depth; at this depth cells are ~1e-9 of the world across.
const MAX_DEPTH: usize = 30;

/// A point quadtree over a fixed bounding rectangle.
///
/// Insertions outside the bounds are rejected rather than clamped, so every
/// stored item is reachable by a range query.
///
/// # Examples
///
/// ```
/// use mapclust::quadtree::{QuadTree, SpatialItem};
/// use mapclust::{Bounds, Point};
///
/// #[derive(PartialEq)]
/// struct Station {
///     name: &'static str,
///     at: Point,
/// }
///
/// impl SpatialItem for Station {
///     fn point(&self) -> Point {
///         self.at
///     }
/// }
///
/// let mut tree = QuadTree::new(Bounds::unit());
/// tree.insert(Station { name: "north", at: Point::new(0.5, 0.1) });
/// tree.insert(Station { name: "south", at: Point::new(0.5, 0.9) });
///
/// let hits = tree.search(&Bounds::new(0.0, 1.0, 0.0, 0.5));
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].name, "north");
/// ```
pub struct QuadTree<T: SpatialItem> {
    bounds: Bounds,
    root: Node<T>,
    len: usize,
}

struct Node<T> {
    bounds: Bounds,
    depth: usize,
    items: SmallVec<[T; 8]>,
    children: Option<Box<[Node<T>; 4]>>,
}

impl<T: SpatialItem> QuadTree<T> {
    /// Create an empty tree covering `bounds`.
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            root: Node::new(bounds, 0),
            len: 0,
        }
    }

    /// Insert an item at its point.
    ///
    /// Returns `false` (and stores nothing) when the point lies outside the
    /// tree bounds. Items at identical coordinates are all kept.
    pub fn insert(&mut self, item: T) -> bool {
        let point = item.point();
        if !self.bounds.contains(&point) {
            return false;
        }
        self.root.insert(item, point);
        self.len += 1;
        true
    }

    /// Remove `item` by identity.
    ///
    /// Descends by the item's point, then matches by equality within the
    /// leaf. Returns `false` when the item is absent.
    pub fn remove(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let point = item.point();
        if !self.bounds.contains(&point) {
            return false;
        }
        let removed = self.root.remove(item, point);
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Drop every item by replacing the root node.
    pub fn clear(&mut self) {
        self.root = Node::new(self.bounds, 0);
        self.len = 0;
    }

    /// Every stored item whose point lies within the closed rectangle
    /// `bounds`. No ordering guarantee.
    pub fn search(&self, bounds: &Bounds) -> Vec<&T> {
        let mut found = Vec::new();
        self.root.search(bounds, &mut found);
        found
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no items.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T: SpatialItem> Node<T> {
    fn new(bounds: Bounds, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            items: SmallVec::new(),
            children: None,
        }
    }

    /// Index of the quadrant child covering `point`, matching the
    /// NW, NE, SW, SE order of [`Bounds::quadrants`]. Points exactly on a
    /// split line land deterministically in the higher quadrant.
    fn child_index(&self, point: &Point) -> usize {
        let east = point.x >= self.bounds.mid_x();
        let south = point.y >= self.bounds.mid_y();
        (south as usize) * 2 + (east as usize)
    }

    fn insert(&mut self, item: T, point: Point) {
        let index = self.child_index(&point);
        if let Some(children) = &mut self.children {
            children[index].insert(item, point);
            return;
        }
        self.items.push(item);
        if self.items.len() > NODE_CAPACITY && self.depth < MAX_DEPTH {
            self.split();
        }
    }

    fn split(&mut self) {
        let quadrants = self.bounds.quadrants();
        let depth = self.depth + 1;
        let mut children = Box::new([
            Node::new(quadrants[0], depth),
            Node::new(quadrants[1], depth),
            Node::new(quadrants[2], depth),
            Node::new(quadrants[3], depth),
        ]);
        for item in self.items.drain(..) {
            let point = item.point();
            let east = point.x >= self.bounds.mid_x();
            let south = point.y >= self.bounds.mid_y();
            let index = (south as usize) * 2 + (east as usize);
            children[index].insert(item, point);
        }
        self.children = Some(children);
    }

    fn remove(&mut self, item: &T, point: Point) -> bool
    where
        T: PartialEq,
    {
        let index = self.child_index(&point);
        if let Some(children) = &mut self.children {
            return children[index].remove(item, point);
        }
        match self.items.iter().position(|stored| stored == item) {
            Some(index) => {
                self.items.swap_remove(index);
                true
            }
            None => false,
        }
    }

    fn search<'a>(&'a self, query: &Bounds, found: &mut Vec<&'a T>) {
        if !query.intersects(&self.bounds) {
            return;
        }
        if query.contains_bounds(&self.bounds) {
            self.collect_all(found);
            return;
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.search(query, found);
            }
            return;
        }
        for item in &self.items {
            if query.contains(&item.point()) {
                found.push(item);
            }
        }
    }

    fn collect_all<'a>(&'a self, found: &mut Vec<&'a T>) {
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.collect_all(found);
            }
            return;
        }
        found.extend(self.items.iter());
    }
}
