//! Linked GL program with a uniform location cache
//!
//! Shaders keep no CPU backup. After context loss they are recreated by
//! reloading their source file, which issues a fresh `LoadShader` command.

use std::collections::HashMap;

use super::backup::GpuResource;
use super::context::{GlContext, GlHandle, GlResult, UniformValue};
use super::state_cache::GlStateCache;
use crate::render::error::{RenderError, RenderResult};

/// GPU side of a shader
#[derive(Debug)]
pub struct GlShader {
    program: Option<GlHandle>,
    uniform_locations: HashMap<String, Option<i32>>,
}

impl GlShader {
    /// Compile and link a program
    pub fn new(gl: &mut dyn GlContext, vertex_source: &str, fragment_source: &str) -> GlResult<Self> {
        let program = gl.create_program(vertex_source, fragment_source)?;
        log::debug!("Linked shader program {:?}", program);
        Ok(Self {
            program: Some(program),
            uniform_locations: HashMap::new(),
        })
    }

    fn live_program(&self) -> RenderResult<GlHandle> {
        self.program.ok_or(RenderError::InvalidatedResource("shader"))
    }

    /// Make the program current
    pub fn bind(&self, gl: &mut dyn GlContext, cache: &mut GlStateCache) -> RenderResult<()> {
        cache.use_program(gl, Some(self.live_program()?))?;
        Ok(())
    }

    /// Set a uniform of this program, which must be bound
    ///
    /// Returns `false` when the program has no such uniform. Lookups are
    /// cached, including misses.
    pub fn set_uniform(&mut self, gl: &mut dyn GlContext, name: &str, value: UniformValue) -> RenderResult<bool> {
        let program = self.live_program()?;
        let location = match self.uniform_locations.get(name) {
            Some(location) => *location,
            None => {
                let location = gl.uniform_location(program, name)?;
                self.uniform_locations.insert(name.to_string(), location);
                location
            }
        };
        match location {
            Some(location) => {
                gl.set_uniform(location, value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete the program; skipped once invalidated
    pub fn destroy(mut self, gl: &mut dyn GlContext, cache: &mut GlStateCache) {
        if let Some(program) = self.program.take() {
            cache.forget(program);
            gl.delete_program(program);
        }
    }

    /// Program name, `None` while invalidated
    pub fn program(&self) -> Option<GlHandle> {
        self.program
    }
}

impl GpuResource for GlShader {
    fn invalidate(&mut self) {
        self.program = None;
        self.uniform_locations.clear();
    }

    fn is_valid(&self) -> bool {
        self.program.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::gl::HeadlessGl;

    const VERTEX: &str = "uniform mat4 u_wvpMat;\nvoid main() {}";
    const FRAGMENT: &str = "uniform vec4 u_colour;\nvoid main() {}";

    #[test]
    fn test_set_uniform() {
        let mut gl = HeadlessGl::new();
        let mut cache = GlStateCache::new();
        let mut shader = GlShader::new(&mut gl, VERTEX, FRAGMENT).unwrap();
        shader.bind(&mut gl, &mut cache).unwrap();

        assert!(shader.set_uniform(&mut gl, "u_colour", UniformValue::Float(1.0)).unwrap());
        assert!(!shader.set_uniform(&mut gl, "u_missing", UniformValue::Int(0)).unwrap());
        assert_eq!(gl.uniform_value(shader.program().unwrap(), "u_colour"), Some(UniformValue::Float(1.0)));
    }

    #[test]
    fn test_invalidate_clears_program_and_cache() {
        let mut gl = HeadlessGl::new();
        let mut cache = GlStateCache::new();
        let mut shader = GlShader::new(&mut gl, VERTEX, FRAGMENT).unwrap();
        shader.bind(&mut gl, &mut cache).unwrap();
        shader.set_uniform(&mut gl, "u_colour", UniformValue::Float(1.0)).unwrap();

        shader.invalidate();
        assert!(!shader.is_valid());
        assert!(shader.uniform_locations.is_empty());
        assert!(matches!(shader.bind(&mut gl, &mut cache), Err(RenderError::InvalidatedResource("shader"))));
    }

    #[test]
    fn test_compile_failure() {
        let mut gl = HeadlessGl::new();
        assert!(GlShader::new(&mut gl, "", FRAGMENT).is_err());
    }
}
