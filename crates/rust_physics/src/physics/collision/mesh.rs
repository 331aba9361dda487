//! Collision mesh representations
//!
//! Mesh and convex colliders keep their geometry in the collider's local space;
//! queries transform rays into that space instead of moving the triangles.

use crate::foundation::math::Vec3;
use crate::physics::error::ValidationError;
use crate::spatial::AABB;
use super::primitives::{Ray, ShapeHit, Triangle};

/// Triangle or point-cloud geometry stored in local coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionMesh {
    vertices: Vec<Vec3>,
    indices: Vec<u32>,
    triangles: Vec<Triangle>,
    local_bounds: AABB,
}

impl CollisionMesh {
    /// Build a triangle mesh from local-space vertices and an index buffer
    ///
    /// The index buffer must be non-empty, a multiple of three long and stay
    /// within the vertex buffer.
    pub fn from_triangles(vertices: Vec<Vec3>, indices: Vec<u32>) -> Result<Self, ValidationError> {
        if indices.is_empty() {
            return Err(ValidationError::invalid("indices", "mesh needs at least one triangle"));
        }
        Self::build(vertices, indices)
    }

    /// Build a convex point cloud with an optional hull index buffer
    pub fn from_points(
        vertices: Vec<Vec3>,
        indices: Option<Vec<u32>>,
    ) -> Result<Self, ValidationError> {
        Self::build(vertices, indices.unwrap_or_default())
    }

    fn build(vertices: Vec<Vec3>, indices: Vec<u32>) -> Result<Self, ValidationError> {
        if vertices.is_empty() {
            return Err(ValidationError::invalid("vertices", "vertex buffer is empty"));
        }
        if vertices.iter().any(|v| !v.iter().all(|c| c.is_finite())) {
            return Err(ValidationError::invalid(
                "vertices",
                "vertex buffer contains a non-finite value",
            ));
        }
        if indices.len() % 3 != 0 {
            return Err(ValidationError::invalid(
                "indices",
                format!("length {} is not a multiple of three", indices.len()),
            ));
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(ValidationError::IndexOutOfRange {
                index,
                vertex_count: vertices.len(),
            });
        }

        let triangles = indices
            .chunks_exact(3)
            .map(|c| {
                Triangle::new(
                    vertices[c[0] as usize],
                    vertices[c[1] as usize],
                    vertices[c[2] as usize],
                )
            })
            .collect();
        let local_bounds = AABB::from_points(&vertices)
            .unwrap_or_else(|| AABB::new(Vec3::zeros(), Vec3::zeros()));

        Ok(Self {
            vertices,
            indices,
            triangles,
            local_bounds,
        })
    }

    /// Local-space vertices
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Triangle index buffer (empty for a bare point cloud)
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Local-space triangles
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Whether ray queries can be answered
    pub fn has_triangles(&self) -> bool {
        !self.triangles.is_empty()
    }

    /// Bounds of the vertices in local space
    pub fn local_bounds(&self) -> &AABB {
        &self.local_bounds
    }

    /// Closest triangle hit for a ray given in local space
    ///
    /// The normal is flipped to face the ray origin.
    pub fn intersect_ray(&self, ray: &Ray, max_distance: f32) -> Option<ShapeHit> {
        if self.local_bounds.intersect_ray(ray.origin, ray.direction)? > max_distance {
            return None;
        }

        let mut closest: Option<ShapeHit> = None;
        for triangle in &self.triangles {
            let Some((t, _, _)) = triangle.intersect_ray(ray) else {
                continue;
            };
            if t > max_distance || closest.is_some_and(|(best, _, _)| t >= best) {
                continue;
            }
            let mut normal = triangle.normal();
            if normal.dot(&ray.direction) > 0.0 {
                normal = -normal;
            }
            closest = Some((t, ray.point_at(t), normal));
        }
        closest
    }
}
