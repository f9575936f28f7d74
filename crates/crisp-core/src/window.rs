//! Thin GLFW window wrapper: just enough to create a Vulkan surface and
//! query framebuffer size for swapchain (re)creation. Input dispatch is out
//! of scope for this crate.

use std::ffi::CString;

use ash::vk;
use glfw::Context as _;

use crate::error::{Error, Result};

/// A GLFW window plus the `glfw::Glfw` handle that owns it.
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::Window,
    events: std::sync::mpsc::Receiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Create a resizable, Vulkan-backed (non-OpenGL-context) window.
    pub fn new(title: &str, width: u32, height: u32) -> Result<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|e| Error::InitializationFailed(format!("glfw init failed: {e}")))?;

        if !glfw.vulkan_supported() {
            return Err(Error::InitializationFailed(
                "GLFW reports no Vulkan loader/ICD available".into(),
            ));
        }

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or_else(|| Error::InitializationFailed("failed to create GLFW window".into()))?;

        Ok(Self {
            glfw,
            window,
            events,
        })
    }

    /// Instance extensions GLFW requires to create a surface for this
    /// window, e.g. `VK_KHR_surface` plus the platform-specific extension.
    pub fn required_instance_extensions(&self) -> Result<Vec<CString>> {
        let extensions = self
            .glfw
            .get_required_instance_extensions()
            .ok_or_else(|| {
                Error::InitializationFailed("GLFW could not determine required extensions".into())
            })?;
        Ok(extensions
            .into_iter()
            .map(|s| CString::new(s).unwrap())
            .collect())
    }

    /// Create a `VkSurfaceKHR` for this window against the given instance.
    pub fn create_surface(&self, instance: &ash::Instance) -> Result<vk::SurfaceKHR> {
        let instance_raw = instance.handle().as_raw();
        let mut surface: u64 = 0;
        let result = self.window.create_window_surface(
            instance_raw as usize,
            std::ptr::null(),
            &mut surface,
        );
        if result != 0 {
            return Err(Error::InitializationFailed(format!(
                "glfwCreateWindowSurface failed with code {result}"
            )));
        }
        Ok(vk::Handle::from_raw(surface))
    }

    /// Current framebuffer size in pixels, used to pick the swapchain
    /// extent on creation and after a resize event.
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (w, h) = self.window.get_framebuffer_size();
        (w as u32, h as u32)
    }

    /// Poll the event queue and report whether the window was resized since
    /// the last call.
    pub fn poll_events(&mut self) -> bool {
        self.glfw.poll_events();
        let mut resized = false;
        for (_, event) in glfw::flush_messages(&self.events) {
            if let glfw::WindowEvent::FramebufferSize(..) = event {
                resized = true;
            }
        }
        resized
    }

    /// Whether the user has requested the window close.
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }
}
