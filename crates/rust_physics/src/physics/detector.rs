//! Narrow-phase collision detection and ray casting
//!
//! Every test works on world-space poses derived from the body transform and
//! the collider's local placement. Contact normals always point from the first
//! body toward the second.

use crate::foundation::collections::BodyHandle;
use crate::foundation::math::{constants::{EPSILON, PARALLEL_EPSILON}, Transform, Vec3};
use crate::physics::body::RigidBody;
use crate::physics::collision::{BoundingSphere, Ray, RaycastHit, ShapeHit, ShapeKind, ShapeType};
use crate::physics::collision_layers::CollisionLayers;

/// Tolerance for "point inside box" tests during box-box manifold building
const CONTAINMENT_TOLERANCE: f32 = 1.0e-3;

/// Cross products shorter than this come from near-parallel edges
const EDGE_AXIS_EPSILON: f32 = 1.0e-3;

/// Edge-edge axes must beat the best face axis by this factor to be chosen
const EDGE_AXIS_PREFERENCE: f32 = 0.95;

/// A single point of contact between two bodies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// World-space contact point
    pub point: Vec3,
    /// Unit normal from the first body toward the second
    pub normal: Vec3,
    /// Overlap depth along the normal, never negative
    pub penetration: f32,
    /// Normal impulse accumulated by the solver this substep
    pub impulse: f32,
}

impl Contact {
    /// New contact with no accumulated impulse
    pub fn new(point: Vec3, normal: Vec3, penetration: f32) -> Self {
        Self {
            point,
            normal,
            penetration: penetration.max(0.0),
            impulse: 0.0,
        }
    }
}

/// Narrow-phase test appending contacts for `(a, b)`; returns true if any were added
type NarrowPhaseFn = fn(&RigidBody, &RigidBody, &mut Vec<Contact>) -> bool;

#[derive(Clone, Copy)]
enum Dispatch {
    /// Call with the arguments as given
    Direct(NarrowPhaseFn),
    /// Call with the arguments swapped, then negate the normals
    Swapped(NarrowPhaseFn),
}

/// Stateless narrow-phase and ray-query functions
#[derive(Debug, Default, Clone, Copy)]
pub struct CollisionDetector;

impl CollisionDetector {
    /// Contacts between two bodies, or `None` when they do not touch
    ///
    /// Unsupported shape pairs also yield `None`.
    pub fn detect_collision(a: &RigidBody, b: &RigidBody) -> Option<Vec<Contact>> {
        let mut contacts = Vec::new();
        Self::detect_into(a, b, &mut contacts).then_some(contacts)
    }

    /// Append contacts between two bodies to `out`
    pub fn detect_into(a: &RigidBody, b: &RigidBody, out: &mut Vec<Contact>) -> bool {
        if !a.aabb().intersects(b.aabb()) {
            return false;
        }
        match Self::dispatch(a.collider().shape_type(), b.collider().shape_type()) {
            Some(Dispatch::Direct(test)) => test(a, b, out),
            Some(Dispatch::Swapped(test)) => {
                let start = out.len();
                let hit = test(b, a, out);
                for contact in &mut out[start..] {
                    contact.normal = -contact.normal;
                }
                hit
            }
            None => false,
        }
    }

    /// Whether a narrow-phase test exists for the ordered pair
    pub fn supports(a: ShapeType, b: ShapeType) -> bool {
        Self::dispatch(a, b).is_some()
    }

    fn dispatch(a: ShapeType, b: ShapeType) -> Option<Dispatch> {
        use Dispatch::{Direct, Swapped};
        use ShapeType::{Box, Capsule, Plane, Sphere};

        let entry = match (a, b) {
            (Sphere, Sphere) => Direct(sphere_sphere),
            (Sphere, Box) => Direct(sphere_box),
            (Box, Sphere) => Swapped(sphere_box),
            (Box, Box) => Direct(box_box),
            (Sphere, Plane) => Direct(sphere_plane),
            (Plane, Sphere) => Swapped(sphere_plane),
            (Box, Plane) => Direct(box_plane),
            (Plane, Box) => Swapped(box_plane),
            (Sphere, Capsule) => Direct(sphere_capsule),
            (Capsule, Sphere) => Swapped(sphere_capsule),
            (Capsule, Plane) => Direct(capsule_plane),
            (Plane, Capsule) => Swapped(capsule_plane),
            _ => return None,
        };
        Some(entry)
    }

    /// Intersect a ray with one body's collider
    pub fn raycast_body(ray: &Ray, max_distance: f32, body: &RigidBody) -> Option<ShapeHit> {
        let pose = shape_pose(body);
        match &body.collider().kind {
            ShapeKind::Sphere { radius } => {
                BoundingSphere::new(pose.position, *radius).intersect_ray(ray, max_distance)
            }
            ShapeKind::Box { half_extents } => raycast_box(ray, max_distance, &pose, half_extents),
            ShapeKind::Plane => raycast_plane(ray, max_distance, &pose),
            ShapeKind::Mesh(mesh) | ShapeKind::Convex(mesh) if mesh.has_triangles() => {
                let local = Ray {
                    origin: pose.inverse_transform_point(ray.origin),
                    direction: pose.inverse_transform_vector(ray.direction),
                };
                mesh.intersect_ray(&local, max_distance).map(|(t, point, normal)| {
                    (t, pose.transform_point(point), pose.transform_vector(normal))
                })
            }
            ShapeKind::Mesh(_)
            | ShapeKind::Convex(_)
            | ShapeKind::Capsule { .. }
            | ShapeKind::Cylinder { .. } => None,
        }
    }

    /// Every hit along the ray, nearest first
    ///
    /// Bodies whose `collision_group` shares no bit with `mask` are skipped.
    pub fn raycast_all<'a>(
        ray: &Ray,
        max_distance: f32,
        bodies: impl IntoIterator<Item = (BodyHandle, &'a RigidBody)>,
        mask: CollisionLayers,
    ) -> Vec<RaycastHit> {
        let mut hits: Vec<RaycastHit> = bodies
            .into_iter()
            .filter(|(_, body)| body.collision_group().intersects(mask))
            .filter(|(_, body)| {
                body.aabb()
                    .intersect_ray(ray.origin, ray.direction)
                    .is_some_and(|entry| entry <= max_distance)
            })
            .filter_map(|(handle, body)| {
                Self::raycast_body(ray, max_distance, body).map(|(distance, point, normal)| {
                    RaycastHit {
                        body: handle,
                        distance,
                        point,
                        normal,
                    }
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    /// Nearest hit along the ray
    pub fn raycast<'a>(
        ray: &Ray,
        max_distance: f32,
        bodies: impl IntoIterator<Item = (BodyHandle, &'a RigidBody)>,
        mask: CollisionLayers,
    ) -> Option<RaycastHit> {
        Self::raycast_all(ray, max_distance, bodies, mask).into_iter().next()
    }

    /// Whether `point` lies inside or on the body's collider
    ///
    /// A plane is the solid half-space below its surface. Convex colliders are
    /// approximated by their local bounds and triangle meshes have no inside.
    pub fn contains_point(body: &RigidBody, point: &Vec3) -> bool {
        let local = shape_pose(body).inverse_transform_point(*point);
        match &body.collider().kind {
            ShapeKind::Sphere { radius } => local.norm() <= *radius,
            ShapeKind::Box { half_extents } => (0..3).all(|i| local[i].abs() <= half_extents[i]),
            ShapeKind::Capsule { radius, height } => {
                let half = (height * 0.5 - radius).max(0.0);
                let core = Vec3::new(0.0, local.y.clamp(-half, half), 0.0);
                (local - core).norm() <= *radius
            }
            ShapeKind::Cylinder { radius, height } => {
                local.y.abs() <= height * 0.5 && local.x.hypot(local.z) <= *radius
            }
            ShapeKind::Plane => local.y <= 0.0,
            ShapeKind::Convex(hull) => hull.local_bounds().contains_point(local),
            ShapeKind::Mesh(_) => false,
        }
    }
}

fn shape_pose(body: &RigidBody) -> Transform {
    body.collider().world_transform(&body.transform())
}

fn plane_normal(pose: &Transform) -> Vec3 {
    pose.transform_vector(Vec3::y())
}

fn sphere_radius(body: &RigidBody) -> f32 {
    match body.collider().kind {
        ShapeKind::Sphere { radius } => radius,
        _ => 0.0,
    }
}

fn box_half_extents(body: &RigidBody) -> Vec3 {
    match body.collider().kind {
        ShapeKind::Box { half_extents } => half_extents,
        _ => Vec3::zeros(),
    }
}

/// World-space end points of the capsule's core segment and its radius
fn capsule_segment(body: &RigidBody) -> (Vec3, Vec3, f32) {
    let pose = shape_pose(body);
    let (radius, height) = match body.collider().kind {
        ShapeKind::Capsule { radius, height } => (radius, height),
        _ => (0.0, 0.0),
    };
    let half = Vec3::new(0.0, (height * 0.5 - radius).max(0.0), 0.0);
    (pose.transform_point(-half), pose.transform_point(half), radius)
}

fn closest_point_on_segment(p: &Vec3, start: &Vec3, end: &Vec3) -> Vec3 {
    let segment = end - start;
    let length_sq = segment.norm_squared();
    if length_sq < EPSILON {
        return *start;
    }
    let t = ((p - start).dot(&segment) / length_sq).clamp(0.0, 1.0);
    start + segment * t
}

fn spheres(
    center_a: Vec3,
    radius_a: f32,
    center_b: Vec3,
    radius_b: f32,
    out: &mut Vec<Contact>,
) -> bool {
    let delta = center_b - center_a;
    let distance = delta.norm();
    let radius_sum = radius_a + radius_b;
    if distance >= radius_sum {
        return false;
    }
    let normal = if distance > EPSILON { delta / distance } else { Vec3::y() };
    out.push(Contact::new(center_a + normal * radius_a, normal, radius_sum - distance));
    true
}

fn sphere_sphere(a: &RigidBody, b: &RigidBody, out: &mut Vec<Contact>) -> bool {
    spheres(shape_pose(a).position, sphere_radius(a), shape_pose(b).position, sphere_radius(b), out)
}

fn sphere_box(a: &RigidBody, b: &RigidBody, out: &mut Vec<Contact>) -> bool {
    let center = shape_pose(a).position;
    let radius = sphere_radius(a);
    let box_pose = shape_pose(b);
    let half = box_half_extents(b);

    let local_center = box_pose.inverse_transform_point(center);
    let closest = local_center.zip_map(&half, |c, h| c.clamp(-h, h));
    let delta = closest - local_center;
    let distance = delta.norm();
    if distance >= radius {
        return false;
    }

    let normal = if distance > EPSILON {
        box_pose.transform_vector(delta / distance)
    } else {
        Vec3::y()
    };
    out.push(Contact::new(box_pose.transform_point(closest), normal, radius - distance));
    true
}

/// Oriented box posed in world space
struct Obb {
    center: Vec3,
    axes: [Vec3; 3],
    half: Vec3,
}

impl Obb {
    fn of(body: &RigidBody) -> Self {
        let pose = shape_pose(body);
        Self {
            center: pose.position,
            axes: [
                pose.transform_vector(Vec3::x()),
                pose.transform_vector(Vec3::y()),
                pose.transform_vector(Vec3::z()),
            ],
            half: box_half_extents(body),
        }
    }

    /// Half-length of the box's projection onto `axis`
    fn projected_radius(&self, axis: &Vec3) -> f32 {
        (0..3).map(|i| self.half[i] * self.axes[i].dot(axis).abs()).sum()
    }

    fn corners(&self) -> impl Iterator<Item = Vec3> + '_ {
        (0..8).map(move |i| {
            let sign = |bit: usize| if i & bit == 0 { -1.0 } else { 1.0 };
            self.center
                + self.axes[0] * (sign(1) * self.half.x)
                + self.axes[1] * (sign(2) * self.half.y)
                + self.axes[2] * (sign(4) * self.half.z)
        })
    }

    fn contains(&self, point: &Vec3) -> bool {
        let d = point - self.center;
        (0..3).all(|i| d.dot(&self.axes[i]).abs() <= self.half[i] + CONTAINMENT_TOLERANCE)
    }

    /// Point of the box furthest along `direction`
    fn support(&self, direction: &Vec3) -> Vec3 {
        (0..3).fold(self.center, |acc, i| {
            let sign = if self.axes[i].dot(direction) >= 0.0 { 1.0 } else { -1.0 };
            acc + self.axes[i] * (sign * self.half[i])
        })
    }
}

/// Separating-axis test over the 15 candidate axes of two oriented boxes
fn box_box(a: &RigidBody, b: &RigidBody, out: &mut Vec<Contact>) -> bool {
    let box_a = Obb::of(a);
    let box_b = Obb::of(b);
    let delta = box_b.center - box_a.center;

    let mut best: Option<(f32, Vec3)> = None;
    let mut test_axis = |axis: Vec3, is_edge: bool| -> bool {
        let Some(axis) = axis.try_normalize(EDGE_AXIS_EPSILON) else {
            // parallel edges, covered by the face axes
            return true;
        };
        let distance = delta.dot(&axis);
        let overlap =
            box_a.projected_radius(&axis) + box_b.projected_radius(&axis) - distance.abs();
        if overlap <= 0.0 {
            return false;
        }
        let replace = match best {
            None => true,
            Some((current, _)) if is_edge => overlap < current * EDGE_AXIS_PREFERENCE,
            Some((current, _)) => overlap < current,
        };
        if replace {
            best = Some((overlap, if distance < 0.0 { -axis } else { axis }));
        }
        true
    };

    for axis in box_a.axes.iter().chain(box_b.axes.iter()) {
        if !test_axis(*axis, false) {
            return false;
        }
    }
    for axis_a in &box_a.axes {
        for axis_b in &box_b.axes {
            if !test_axis(axis_a.cross(axis_b), true) {
                return false;
            }
        }
    }
    let Some((penetration, normal)) = best else {
        return false;
    };

    // n points A -> B: B's lowest face along n and A's highest face along n
    let b_face = box_b.center.dot(&normal) - box_b.projected_radius(&normal);
    let a_face = box_a.center.dot(&normal) + box_a.projected_radius(&normal);

    let start = out.len();
    for corner in box_a.corners().filter(|c| box_b.contains(c)) {
        let depth = (corner.dot(&normal) - b_face).clamp(0.0, penetration);
        out.push(Contact::new(corner, normal, depth));
    }
    for corner in box_b.corners().filter(|c| box_a.contains(c)) {
        let depth = (a_face - corner.dot(&normal)).clamp(0.0, penetration);
        out.push(Contact::new(corner, normal, depth));
    }
    if out.len() == start {
        let midpoint = (box_a.support(&normal) + box_b.support(&-normal)) * 0.5;
        out.push(Contact::new(midpoint, normal, penetration));
    }
    true
}

fn sphere_plane(a: &RigidBody, b: &RigidBody, out: &mut Vec<Contact>) -> bool {
    let center = shape_pose(a).position;
    let radius = sphere_radius(a);
    let plane = shape_pose(b);
    let normal = plane_normal(&plane);

    let signed_distance = (center - plane.position).dot(&normal);
    if signed_distance >= radius {
        return false;
    }
    out.push(Contact::new(center - normal * signed_distance, -normal, radius - signed_distance));
    true
}

fn box_plane(a: &RigidBody, b: &RigidBody, out: &mut Vec<Contact>) -> bool {
    let cuboid = Obb::of(a);
    let plane = shape_pose(b);
    let normal = plane_normal(&plane);

    let start = out.len();
    for corner in cuboid.corners() {
        let signed_distance = (corner - plane.position).dot(&normal);
        if signed_distance < 0.0 {
            out.push(Contact::new(corner, -normal, -signed_distance));
        }
    }
    out.len() > start
}

fn sphere_capsule(a: &RigidBody, b: &RigidBody, out: &mut Vec<Contact>) -> bool {
    let center = shape_pose(a).position;
    let (start, end, capsule_radius) = capsule_segment(b);
    let closest = closest_point_on_segment(&center, &start, &end);
    spheres(center, sphere_radius(a), closest, capsule_radius, out)
}

fn capsule_plane(a: &RigidBody, b: &RigidBody, out: &mut Vec<Contact>) -> bool {
    let (start, end, radius) = capsule_segment(a);
    let plane = shape_pose(b);
    let normal = plane_normal(&plane);

    let caps = [start, end];
    let cap_count = if (end - start).norm_squared() < EPSILON { 1 } else { 2 };
    let first = out.len();
    for cap in &caps[..cap_count] {
        let signed_distance = (cap - plane.position).dot(&normal);
        if signed_distance < radius {
            out.push(Contact::new(
                cap - normal * signed_distance,
                -normal,
                radius - signed_distance,
            ));
        }
    }
    out.len() > first
}

fn raycast_box(ray: &Ray, max_distance: f32, pose: &Transform, half: &Vec3) -> Option<ShapeHit> {
    let origin = pose.inverse_transform_point(ray.origin);
    let direction = pose.inverse_transform_vector(ray.direction);

    let mut tmin = f32::NEG_INFINITY;
    let mut tmax = f32::INFINITY;
    let mut entry_normal = Vec3::zeros();

    for i in 0..3 {
        if direction[i].abs() < EPSILON {
            if origin[i] < -half[i] || origin[i] > half[i] {
                return None;
            }
            continue;
        }
        let t1 = (-half[i] - origin[i]) / direction[i];
        let t2 = (half[i] - origin[i]) / direction[i];
        // entering through the -h face when t1 < t2
        let (near, far, sign) = if t1 < t2 { (t1, t2, -1.0) } else { (t2, t1, 1.0) };
        if near > tmin {
            tmin = near;
            entry_normal = Vec3::zeros();
            entry_normal[i] = sign;
        }
        tmax = tmax.min(far);
        if tmin > tmax {
            return None;
        }
    }

    if tmax < 0.0 {
        return None;
    }
    if tmin < 0.0 {
        return Some((0.0, ray.origin, -ray.direction));
    }
    if tmin > max_distance {
        return None;
    }
    Some((tmin, ray.point_at(tmin), pose.transform_vector(entry_normal)))
}

fn raycast_plane(ray: &Ray, max_distance: f32, pose: &Transform) -> Option<ShapeHit> {
    let normal = plane_normal(pose);
    let denominator = ray.direction.dot(&normal);
    if denominator.abs() < PARALLEL_EPSILON {
        return None;
    }
    let t = (pose.position - ray.origin).dot(&normal) / denominator;
    if !(0.0..=max_distance).contains(&t) {
        return None;
    }
    // report the side facing the ray
    let facing = if denominator < 0.0 { normal } else { -normal };
    Some((t, ray.point_at(t), facing))
}
