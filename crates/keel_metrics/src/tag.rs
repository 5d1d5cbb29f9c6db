//! Memory type tags for allocation accounting

/// Semantic category attached to every allocation.
///
/// Tags describe what the memory is *for*, orthogonal to which physical
/// allocator served the request, and drive the per-tag breakdown in the
/// metric registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum MemoryTag {
    Unknown = 0,
    Engine,
    Array,
    String,
    Texture,
    Geometry,
    Material,
    Shader,
    Scene,
    Renderer,
    Job,
    Audio,
    Ui,
}

impl MemoryTag {
    /// Number of variants, sized for per-tag stat tables.
    pub const COUNT: usize = 13;

    pub const ALL: [MemoryTag; Self::COUNT] = [
        MemoryTag::Unknown,
        MemoryTag::Engine,
        MemoryTag::Array,
        MemoryTag::String,
        MemoryTag::Texture,
        MemoryTag::Geometry,
        MemoryTag::Material,
        MemoryTag::Shader,
        MemoryTag::Scene,
        MemoryTag::Renderer,
        MemoryTag::Job,
        MemoryTag::Audio,
        MemoryTag::Ui,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MemoryTag::Unknown => "unknown",
            MemoryTag::Engine => "engine",
            MemoryTag::Array => "array",
            MemoryTag::String => "string",
            MemoryTag::Texture => "texture",
            MemoryTag::Geometry => "geometry",
            MemoryTag::Material => "material",
            MemoryTag::Shader => "shader",
            MemoryTag::Scene => "scene",
            MemoryTag::Renderer => "renderer",
            MemoryTag::Job => "job",
            MemoryTag::Audio => "audio",
            MemoryTag::Ui => "ui",
        }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_covers_every_variant() {
        assert_eq!(MemoryTag::ALL.len(), MemoryTag::COUNT);
        for (i, tag) in MemoryTag::ALL.iter().enumerate() {
            assert_eq!(tag.index(), i);
        }
    }
}
