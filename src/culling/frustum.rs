use assert2::debug_assert;
use bon::bon;
use nalgebra::Unit;

use crate::geometry::{FloatType, PlaneEquation, WorldBox, WorldPoint, WorldVector};

/// Plane given by a point and a unit normal pointing out of the frustum.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane {
    pub normal: Unit<WorldVector>,
    pub point: WorldPoint,
}

impl Plane {
    pub fn new(normal: Unit<WorldVector>, point: WorldPoint) -> Plane {
        Plane { normal, point }
    }

    /// Distance of the point from the plane, positive on the side the normal points to.
    pub fn signed_distance(&self, p: &WorldPoint) -> FloatType {
        self.normal.dot(&(p - self.point))
    }

    /// Coefficients (a, b, c, d) such that a x + b y + c z + d = 0 on the plane.
    pub fn equation(&self) -> PlaneEquation {
        let n = self.normal.as_ref();
        let d = -(n.x * self.point.x + n.y * self.point.y + n.z * self.point.z);
        PlaneEquation::new(n.x, n.y, n.z, d)
    }

    /// Signed distance of the box's closest point to the plane.
    /// Positive if the whole box is on the outer side.
    ///
    /// The SIMD batch test evaluates exactly the same expressions, in the same order.
    pub fn box_distance(&self, center: &WorldVector, extent: &WorldVector) -> FloatType {
        let [a, b, c, d]: [FloatType; 4] = self.equation().into();
        let s = a * center.x + b * center.y + c * center.z + d;
        let r = a.abs() * extent.x + b.abs() * extent.y + c.abs() * extent.z;
        s - r
    }
}

/// Index of a frustum plane.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrustumPlane {
    Near = 0,
    Far = 1,
    Left = 2,
    Right = 3,
    Bottom = 4,
    Top = 5,
}

impl FrustumPlane {
    pub const ALL: [FrustumPlane; 6] = [
        FrustumPlane::Near,
        FrustumPlane::Far,
        FrustumPlane::Left,
        FrustumPlane::Right,
        FrustumPlane::Bottom,
        FrustumPlane::Top,
    ];
}

/// View frustum of a perspective camera.
#[derive(Copy, Clone, Debug)]
pub struct Frustum {
    planes: [Plane; 6],

    eye: WorldPoint,
    forward: Unit<WorldVector>,
    right: Unit<WorldVector>,
    up: Unit<WorldVector>,

    near: FloatType,
    far: FloatType,
    /// Half height of the near rectangle
    near_half_height: FloatType,
    /// Half height of the far rectangle
    far_half_height: FloatType,
    aspect_ratio: FloatType,
}

#[bon]
impl Frustum {
    /// Builds the frustum of a camera at `eye`, looking along `forward`.
    /// `vertical_fov` is the full vertical opening angle in radians,
    /// `aspect_ratio` is width / height.
    #[builder]
    pub fn new(
        eye: WorldPoint,
        forward: WorldVector,
        up: WorldVector,
        vertical_fov: FloatType,
        aspect_ratio: FloatType,
        near: FloatType,
        far: FloatType,
    ) -> Self {
        debug_assert!(vertical_fov > 0.0 && vertical_fov < std::f32::consts::PI);
        debug_assert!(aspect_ratio > 0.0);
        debug_assert!(near > 0.0);
        debug_assert!(far > near);

        let forward = Unit::new_normalize(forward);
        let right = Unit::new_normalize(forward.cross(&up));
        debug_assert!(
            right.iter().all(|x| x.is_finite()),
            "`up` and `forward` must be linearly independent"
        );
        let up = Unit::new_normalize(right.cross(forward.as_ref()));

        let tan_vertical = (vertical_fov / 2.0).tan();
        let tan_horizontal = tan_vertical * aspect_ratio;

        let near_half_height = near * tan_vertical;
        let far_half_height = near_half_height * (far / near);

        let side = |axis: &WorldVector, tan: FloatType| {
            Plane::new(Unit::new_normalize(axis - forward.as_ref() * tan), eye)
        };

        let planes = [
            Plane::new(-forward, eye + forward.as_ref() * near),
            Plane::new(forward, eye + forward.as_ref() * far),
            side(&-right.as_ref(), tan_horizontal),
            side(right.as_ref(), tan_horizontal),
            side(&-up.as_ref(), tan_vertical),
            side(up.as_ref(), tan_vertical),
        ];

        Frustum {
            planes,
            eye,
            forward,
            right,
            up,
            near,
            far,
            near_half_height,
            far_half_height,
            aspect_ratio,
        }
    }
}

impl Frustum {
    /// Planes in the order near, far, left, right, bottom, top.
    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    pub fn plane(&self, which: FrustumPlane) -> &Plane {
        &self.planes[which as usize]
    }

    pub fn eye(&self) -> WorldPoint {
        self.eye
    }

    pub fn forward(&self) -> Unit<WorldVector> {
        self.forward
    }

    /// Points exactly on a plane count as inside.
    pub fn contains_point(&self, p: &WorldPoint) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(p) <= 0.0)
    }

    /// Conservative box test, false only if the box is completely outside one of the planes.
    /// Boxes touching a plane from the outside are still visible.
    pub fn intersects_box(&self, b: &WorldBox) -> bool {
        let center = (b.min.coords + b.max.coords) * 0.5;
        let extent = (b.max.coords - b.min.coords) * 0.5;
        self.planes
            .iter()
            .all(|plane| plane.box_distance(&center, &extent) <= 0.0)
    }

    /// Corners of the near rectangle followed by corners of the far rectangle,
    /// each in the order bottom left, bottom right, top right, top left.
    pub fn corners(&self) -> [WorldPoint; 8] {
        let rectangle = |distance: FloatType, half_height: FloatType| {
            let center = self.eye + self.forward.as_ref() * distance;
            let dy = self.up.as_ref() * half_height;
            let dx = self.right.as_ref() * (half_height * self.aspect_ratio);
            [
                center - dx - dy,
                center + dx - dy,
                center + dx + dy,
                center - dx + dy,
            ]
        };
        let [a, b, c, d] = rectangle(self.near, self.near_half_height);
        let [e, f, g, h] = rectangle(self.far, self.far_half_height);
        [a, b, c, d, e, f, g, h]
    }
}
