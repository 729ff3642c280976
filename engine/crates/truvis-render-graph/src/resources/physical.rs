use ash::vk;

/// 登记到 registry 的图像
///
/// 图像本身由外部（资源管理器 / swapchain）创建和销毁，这里只记录
/// barrier 和 rendering 需要的信息。
#[derive(Clone, Debug)]
pub struct RgPhysicalImage {
    pub name: String,
    pub vk_image: vk::Image,
    pub vk_view: vk::ImageView,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub mip_levels: u32,
    pub array_layers: u32,
}

impl RgPhysicalImage {
    pub fn new(
        name: impl Into<String>,
        vk_image: vk::Image,
        vk_view: vk::ImageView,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> Self {
        Self {
            name: name.into(),
            vk_image,
            vk_view,
            format,
            extent,
            mip_levels: 1,
            array_layers: 1,
        }
    }

    /// builder
    #[inline]
    pub fn with_subresources(mut self, mip_levels: u32, array_layers: u32) -> Self {
        self.mip_levels = mip_levels;
        self.array_layers = array_layers;
        self
    }

    /// 根据 format 推断 aspect
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        match self.format {
            vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
                vk::ImageAspectFlags::DEPTH
            }

            vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,

            vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            }

            _ => vk::ImageAspectFlags::COLOR,
        }
    }

    #[inline]
    pub fn is_depth(&self) -> bool {
        self.aspect().intersects(vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL)
    }

    /// barrier 覆盖整个图像
    #[inline]
    pub fn full_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect(),
            base_mip_level: 0,
            level_count: self.mip_levels,
            base_array_layer: 0,
            layer_count: self.array_layers,
        }
    }
}

/// 登记到 registry 的缓冲区
#[derive(Clone, Debug)]
pub struct RgPhysicalBuffer {
    pub name: String,
    pub vk_buffer: vk::Buffer,
    pub size: vk::DeviceSize,
}

impl RgPhysicalBuffer {
    pub fn new(name: impl Into<String>, vk_buffer: vk::Buffer, size: vk::DeviceSize) -> Self {
        Self {
            name: name.into(),
            vk_buffer,
            size,
        }
    }
}

/// 登记到 registry 的采样器，不参与 barrier
#[derive(Clone, Debug)]
pub struct RgPhysicalSampler {
    pub name: String,
    pub vk_sampler: vk::Sampler,
}

impl RgPhysicalSampler {
    pub fn new(name: impl Into<String>, vk_sampler: vk::Sampler) -> Self {
        Self {
            name: name.into(),
            vk_sampler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(format: vk::Format) -> RgPhysicalImage {
        RgPhysicalImage::new(
            "test",
            vk::Image::null(),
            vk::ImageView::null(),
            format,
            vk::Extent2D { width: 4, height: 4 },
        )
    }

    #[test]
    fn test_aspect_inference() {
        assert_eq!(image(vk::Format::R8G8B8A8_UNORM).aspect(), vk::ImageAspectFlags::COLOR);
        assert_eq!(image(vk::Format::D32_SFLOAT).aspect(), vk::ImageAspectFlags::DEPTH);
        assert!(image(vk::Format::D24_UNORM_S8_UINT).is_depth());
        assert!(!image(vk::Format::B8G8R8A8_SRGB).is_depth());
    }

    #[test]
    fn test_full_range_covers_layers() {
        let range = image(vk::Format::D16_UNORM).with_subresources(1, 6).full_range();
        assert_eq!(range.layer_count, 6);
        assert_eq!(range.aspect_mask, vk::ImageAspectFlags::DEPTH);
    }
}
