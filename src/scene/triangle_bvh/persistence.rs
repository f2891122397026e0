use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    mem::size_of,
    path::Path,
};

use bytemuck::Pod;
use log::info;
use thiserror::Error;

use crate::{
    geometry::{TriangleIdx, WorldBox},
    scene::TriangleSoup,
};

use super::{Bvh, BvhNode, NodeLink};

const MAGIC: [u8; 4] = *b"MBVH";
const VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum BvhReadError {
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("Not a BVH file")]
    BadMagic,

    #[error("Unsupported BVH format version {0}")]
    UnsupportedVersion(u32),

    #[error("BVH data is truncated")]
    Truncated,

    #[error("Corrupt BVH data: {0}")]
    Corrupt(&'static str),
}

impl From<io::Error> for BvhReadError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            BvhReadError::Truncated
        } else {
            BvhReadError::Io(e)
        }
    }
}

impl Bvh {
    /// Serializes the tree.
    ///
    /// Layout, all little endian: magic `MBVH`, format version (u32), triangle count (u32),
    /// node count (u32), triangle permutation (u32 each), nodes (32 bytes each).
    pub fn write_to(&self, mut writer: impl Write) -> io::Result<()> {
        let triangle_count = u32::try_from(self.triangle_indices.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Too many triangles"))?;
        let node_count = u32::try_from(self.nodes.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Too many nodes"))?;

        writer.write_all(&MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&triangle_count.to_le_bytes())?;
        writer.write_all(&node_count.to_le_bytes())?;

        let indices: Vec<u32> = self
            .triangle_indices
            .iter()
            .map(|i| i.raw().to_le())
            .collect();
        writer.write_all(bytemuck::cast_slice(&indices))?;

        let nodes: Vec<BvhNode> = self.nodes.iter().map(|n| n.to_le()).collect();
        writer.write_all(bytemuck::cast_slice(&nodes))?;

        Ok(())
    }

    /// Deserializes and validates a tree written by `write_to`.
    pub fn read_from(mut reader: impl Read) -> Result<Bvh, BvhReadError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(BvhReadError::BadMagic);
        }

        let version = read_u32(&mut reader)?;
        if version != VERSION {
            return Err(BvhReadError::UnsupportedVersion(version));
        }

        let triangle_count = read_u32(&mut reader)? as usize;
        let node_count = read_u32(&mut reader)? as usize;

        let indices: Vec<u32> = read_pod_vec(&mut reader, triangle_count)?;
        let nodes: Vec<BvhNode> = read_pod_vec(&mut reader, node_count)?;

        let bvh = Bvh {
            nodes: nodes.into_iter().map(BvhNode::from_le).collect(),
            triangle_indices: indices
                .into_iter()
                .map(|i| TriangleIdx::from_raw(u32::from_le(i)))
                .collect(),
        };
        bvh.validate()?;
        Ok(bvh)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        info!(
            "Saved BVH with {} nodes to {}",
            self.node_count(),
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Bvh, BvhReadError> {
        let bvh = Self::read_from(BufReader::new(
            File::open(path.as_ref()).map_err(BvhReadError::Io)?,
        ))?;
        info!(
            "Loaded BVH with {} nodes from {}",
            bvh.node_count(),
            path.as_ref().display()
        );
        Ok(bvh)
    }

    /// True if the tree can answer queries for this soup.
    ///
    /// The file format doesn't record the scene, so a cached tree is checked against it:
    /// the triangle count must match, the root box must equal the bounds of the soup and
    /// every node box must enclose its children and its triangles.
    pub fn fits(&self, soup: &TriangleSoup) -> bool {
        if self.triangle_count() != soup.len() {
            return false;
        }
        let soup_bounds = WorldBox::from_points(soup.iter().flatten());
        if soup_bounds != self.root().map(BvhNode::bounds) {
            return false;
        }

        self.nodes.iter().all(|node| {
            let bounds = node.bounds();
            match node.link() {
                NodeLink::Leaf { triangles } => self.triangle_indices[triangles]
                    .iter()
                    .flat_map(|&i| soup.triangle(i))
                    .all(|p| bounds.contains(&p)),
                NodeLink::Inner { left } => [left, left + 1].into_iter().all(|child| {
                    self.nodes[child]
                        .bounds()
                        .corners()
                        .iter()
                        .all(|corner| bounds.contains(corner))
                }),
            }
        })
    }

    /// Checks that traversal of the tree stays in bounds and terminates.
    fn validate(&self) -> Result<(), BvhReadError> {
        let triangle_count = self.triangle_indices.len();
        let node_count = self.nodes.len();

        if triangle_count == 0 {
            return if node_count == 0 {
                Ok(())
            } else {
                Err(BvhReadError::Corrupt("nodes without triangles"))
            };
        }
        if node_count == 0 {
            return Err(BvhReadError::Corrupt("triangles without nodes"));
        }
        if node_count > 2 * triangle_count - 1 {
            return Err(BvhReadError::Corrupt("too many nodes"));
        }

        let mut seen = vec![false; triangle_count];
        for i in &self.triangle_indices {
            let Some(slot) = seen.get_mut(i.index()) else {
                return Err(BvhReadError::Corrupt("triangle index out of range"));
            };
            if *slot {
                return Err(BvhReadError::Corrupt("duplicate triangle index"));
            }
            *slot = true;
        }

        let mut covered = vec![false; triangle_count];
        let mut has_parent = vec![false; node_count];
        for (index, node) in self.nodes.iter_enumerated() {
            if node.is_leaf() {
                let end = node.left_first as u64 + node.tri_count as u64;
                if end > triangle_count as u64 {
                    return Err(BvhReadError::Corrupt("leaf range out of bounds"));
                }
                for slot in &mut covered[node.triangle_range()] {
                    if *slot {
                        return Err(BvhReadError::Corrupt("overlapping leaves"));
                    }
                    *slot = true;
                }
            } else {
                // Children always come after their parent, this also rules out cycles
                let left = node.left_first as usize;
                if left <= index.index() || left + 1 >= node_count {
                    return Err(BvhReadError::Corrupt("child index out of range"));
                }
                for child in [left, left + 1] {
                    if has_parent[child] {
                        return Err(BvhReadError::Corrupt("node shared between parents"));
                    }
                    has_parent[child] = true;
                }
            }
        }

        // With a single parent per node every node is reached exactly once from the root
        if has_parent[1..].contains(&false) {
            return Err(BvhReadError::Corrupt("unreachable node"));
        }
        if covered.contains(&false) {
            return Err(BvhReadError::Corrupt("triangle not in any leaf"));
        }

        Ok(())
    }
}

fn read_u32(reader: &mut impl Read) -> Result<u32, BvhReadError> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Reads `count` plain values, without trusting `count` for the allocation size.
fn read_pod_vec<T: Pod>(reader: &mut impl Read, count: usize) -> Result<Vec<T>, BvhReadError> {
    let byte_len = count
        .checked_mul(size_of::<T>())
        .ok_or(BvhReadError::Corrupt("size overflow"))?;

    let mut bytes = Vec::new();
    reader.take(byte_len as u64).read_to_end(&mut bytes)?;
    if bytes.len() < byte_len {
        return Err(BvhReadError::Truncated);
    }

    Ok(bytes
        .chunks_exact(size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect())
}
