//! 示例场景：一个相机和若干绕原点旋转的点光源

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// forward pass 的相机 uniform
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: Mat4,
    pub position: Vec4,
}

/// 单个灯光在 light buffer 中的布局
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightUniform {
    pub view_proj: Mat4,
    pub position: Vec4,
    pub color: Vec4,
}

#[derive(Clone, Copy, Debug)]
pub struct SceneLight {
    pub position: Vec3,
    pub color: Vec3,
}

impl SceneLight {
    /// 朝向原点的透视投影，用于渲染 shadow map
    pub fn view_proj(&self) -> Mat4 {
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y);
        proj * view
    }

    pub fn uniform(&self) -> LightUniform {
        LightUniform {
            view_proj: self.view_proj(),
            position: self.position.extend(1.0),
            color: self.color.extend(1.0),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SceneData {
    pub camera_position: Vec3,
    pub lights: Vec<SceneLight>,
    /// 场景网格的 index 数量
    pub index_count: u32,
}

impl SceneData {
    /// `light_count` 个灯光均匀分布在半径为 8 的圆上，随 `time` 旋转
    pub fn orbiting(light_count: usize, time: f32) -> Self {
        let lights = (0..light_count)
            .map(|i| {
                let angle = time + i as f32 * std::f32::consts::TAU / light_count as f32;
                SceneLight {
                    position: Vec3::new(angle.cos() * 8.0, 6.0, angle.sin() * 8.0),
                    color: Vec3::ONE,
                }
            })
            .collect();

        Self {
            camera_position: Vec3::new(0.0, 4.0, 12.0),
            lights,
            index_count: 36,
        }
    }

    pub fn camera_uniform(&self, aspect: f32) -> CameraUniform {
        let proj = Mat4::perspective_rh(45f32.to_radians(), aspect, 0.1, 200.0);
        let view = Mat4::look_at_rh(self.camera_position, Vec3::ZERO, Vec3::Y);
        CameraUniform {
            view_proj: proj * view,
            position: self.camera_position.extend(1.0),
        }
    }
}
