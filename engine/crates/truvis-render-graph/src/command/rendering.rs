//! Graphics Pass 的 dynamic rendering 参数

use ash::vk;
use bitflags::bitflags;

use crate::error::{RgError, RgResult};
use crate::handles::GfxImageHandle;
use crate::resources::registry::RgResourceRegistry;

bitflags! {
    /// start_rendering 时实际绑定的附件
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct RgAttachmentSet: u8 {
        const COLOR = 0b01;
        const DEPTH = 0b10;
    }
}

/// 渲染目标：若干颜色附件 + 可选的深度附件
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RgRenderTarget {
    pub color: Vec<GfxImageHandle>,
    pub depth: Option<GfxImageHandle>,
}

impl RgRenderTarget {
    pub fn new(color: Vec<GfxImageHandle>, depth: Option<GfxImageHandle>) -> Self {
        Self { color, depth }
    }

    pub fn color_only(color: GfxImageHandle) -> Self {
        Self {
            color: vec![color],
            depth: None,
        }
    }

    pub fn depth_only(depth: GfxImageHandle) -> Self {
        Self {
            color: Vec::new(),
            depth: Some(depth),
        }
    }
}

/// `RgGraphicsPassContext::start_rendering` 的参数
#[derive(Clone, Debug, PartialEq)]
pub struct RgRenderingInfo {
    pub target: RgRenderTarget,
    pub attachments: RgAttachmentSet,
    pub width: u32,
    pub height: u32,
    /// false 时使用 LOAD，保留附件原有内容
    pub clear: bool,
    pub clear_color: [f32; 4],
}

// new & init
impl RgRenderingInfo {
    /// 默认绑定 target 中存在的全部附件，并清屏为黑色
    pub fn new(target: RgRenderTarget, width: u32, height: u32) -> Self {
        let mut attachments = RgAttachmentSet::empty();
        if !target.color.is_empty() {
            attachments |= RgAttachmentSet::COLOR;
        }
        if target.depth.is_some() {
            attachments |= RgAttachmentSet::DEPTH;
        }
        Self {
            target,
            attachments,
            width,
            height,
            clear: true,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// builder
    #[inline]
    pub fn attachments(mut self, attachments: RgAttachmentSet) -> Self {
        self.attachments = attachments;
        self
    }

    /// builder
    #[inline]
    pub fn clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear = true;
        self.clear_color = clear_color;
        self
    }

    /// builder
    #[inline]
    pub fn load(mut self) -> Self {
        self.clear = false;
        self
    }
}

impl RgRenderingInfo {
    /// 把 image 句柄换成 image view
    pub(crate) fn resolve(&self, pass: &str, registry: &RgResourceRegistry) -> RgResult<RgResolvedRendering> {
        let color_views = if self.attachments.contains(RgAttachmentSet::COLOR) {
            if self.target.color.is_empty() {
                return Err(RgError::MissingAttachment {
                    pass: pass.to_string(),
                    attachment: "color",
                });
            }
            self.target
                .color
                .iter()
                .map(|&image| registry.get_image(image).map(|image| image.vk_view))
                .collect::<RgResult<Vec<_>>>()?
        } else {
            Vec::new()
        };

        let depth_view = if self.attachments.contains(RgAttachmentSet::DEPTH) {
            let depth = self.target.depth.ok_or_else(|| RgError::MissingAttachment {
                pass: pass.to_string(),
                attachment: "depth",
            })?;
            Some(registry.get_image(depth)?.vk_view)
        } else {
            None
        };

        Ok(RgResolvedRendering {
            color_views,
            depth_view,
            area: vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: vk::Extent2D {
                    width: self.width,
                    height: self.height,
                },
            },
            clear: self.clear,
            clear_color: self.clear_color,
        })
    }
}

/// 已经解析为 vk 对象的 rendering 参数，交给 recorder
#[derive(Clone, Debug, PartialEq)]
pub struct RgResolvedRendering {
    pub color_views: Vec<vk::ImageView>,
    pub depth_view: Option<vk::ImageView>,
    pub area: vk::Rect2D,
    pub clear: bool,
    pub clear_color: [f32; 4],
}

impl RgResolvedRendering {
    #[inline]
    fn load_op(&self) -> vk::AttachmentLoadOp {
        if self.clear { vk::AttachmentLoadOp::CLEAR } else { vk::AttachmentLoadOp::LOAD }
    }

    pub fn color_attachments(&self) -> Vec<vk::RenderingAttachmentInfo<'static>> {
        self.color_views
            .iter()
            .map(|&view| {
                vk::RenderingAttachmentInfo::default()
                    .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .image_view(view)
                    .load_op(self.load_op())
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .clear_value(vk::ClearValue {
                        color: vk::ClearColorValue {
                            float32: self.clear_color,
                        },
                    })
            })
            .collect()
    }

    pub fn depth_attachment(&self) -> Option<vk::RenderingAttachmentInfo<'static>> {
        self.depth_view.map(|view| {
            vk::RenderingAttachmentInfo::default()
                .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .image_view(view)
                .load_op(self.load_op())
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: 1_f32, // 1 表示无限远
                        stencil: 0,
                    },
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::physical::RgPhysicalImage;

    fn register(registry: &mut RgResourceRegistry, format: vk::Format) -> GfxImageHandle {
        registry.register_image(RgPhysicalImage::new(
            "attachment",
            vk::Image::null(),
            vk::ImageView::null(),
            format,
            vk::Extent2D { width: 16, height: 16 },
        ))
    }

    #[test]
    fn test_default_attachment_set_follows_target() {
        let mut registry = RgResourceRegistry::new();
        let depth = register(&mut registry, vk::Format::D32_SFLOAT);
        let info = RgRenderingInfo::new(RgRenderTarget::depth_only(depth), 16, 16);
        assert_eq!(info.attachments, RgAttachmentSet::DEPTH);

        let resolved = info.resolve("shadow", &registry).unwrap();
        assert!(resolved.color_attachments().is_empty());
        assert!(resolved.depth_attachment().is_some());
    }

    #[test]
    fn test_missing_depth_attachment() {
        let mut registry = RgResourceRegistry::new();
        let color = register(&mut registry, vk::Format::R8G8B8A8_UNORM);
        let info = RgRenderingInfo::new(RgRenderTarget::color_only(color), 16, 16)
            .attachments(RgAttachmentSet::COLOR | RgAttachmentSet::DEPTH);
        let err = info.resolve("forward", &registry).unwrap_err();
        assert!(matches!(err, RgError::MissingAttachment { attachment: "depth", .. }));
    }

    #[test]
    fn test_load_keeps_contents() {
        let mut registry = RgResourceRegistry::new();
        let color = register(&mut registry, vk::Format::R8G8B8A8_UNORM);
        let resolved = RgRenderingInfo::new(RgRenderTarget::color_only(color), 16, 16)
            .load()
            .resolve("overlay", &registry)
            .unwrap();
        assert_eq!(resolved.color_attachments()[0].load_op, vk::AttachmentLoadOp::LOAD);
    }
}
