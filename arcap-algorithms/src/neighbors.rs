use kd_tree::{KdPoint, KdTree};
use nalgebra::Vector3;

/// A position that remembers its index within the object it was taken from
#[derive(Debug, Copy, Clone, PartialEq)]
struct IndexedPosition {
    position: [f32; 3],
    index: usize,
}

impl KdPoint for IndexedPosition {
    type Scalar = f32;
    type Dim = typenum::U3;
    fn at(&self, k: usize) -> f32 {
        self.position[k]
    }
}

/// A neighbor of a query position, as `(index, squared_distance)`
pub type Neighbor = (usize, f32);

/// kd-tree over a set of positions for nearest neighbor and radius queries
pub struct NeighborIndex {
    tree: KdTree<IndexedPosition>,
}

impl NeighborIndex {
    pub fn build(positions: &[Vector3<f32>]) -> Self {
        let points = positions
            .iter()
            .enumerate()
            .map(|(index, position)| IndexedPosition {
                position: [position.x, position.y, position.z],
                index,
            })
            .collect::<Vec<_>>();
        Self {
            tree: KdTree::build_by_ordered_float(points),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// The `k` positions closest to `query`, ordered by increasing distance
    pub fn nearest(&self, query: &Vector3<f32>, k: usize) -> Vec<Neighbor> {
        if k == 0 {
            return vec![];
        }
        self.tree
            .nearests(&[query.x, query.y, query.z], k)
            .into_iter()
            .map(|neighbor| (neighbor.item.index, neighbor.squared_distance))
            .collect()
    }

    /// Like [nearest](NeighborIndex::nearest), but excludes the position with index `own_index`
    pub fn nearest_excluding(&self, query: &Vector3<f32>, own_index: usize, k: usize) -> Vec<Neighbor> {
        let mut neighbors = self.nearest(query, k + 1);
        match neighbors.iter().position(|(index, _)| *index == own_index) {
            Some(own_position) => {
                neighbors.remove(own_position);
            }
            None => neighbors.truncate(k),
        }
        neighbors
    }

    /// The at most `max_neighbors` closest positions within `radius` of `query`
    pub fn within_radius(&self, query: &Vector3<f32>, radius: f32, max_neighbors: usize) -> Vec<Neighbor> {
        let radius_squared = radius * radius;
        let mut neighbors = self.nearest(query, max_neighbors);
        neighbors.retain(|(_, squared_distance)| *squared_distance <= radius_squared);
        neighbors
    }
}
