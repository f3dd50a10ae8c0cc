use crate::compile::ProgramLocations;

/// Column-major 4x4 matrix, laid out as the std140 `mat4` the shaders declare.
pub type Mat4 = [[f32; 4]; 4];

pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Right-handed orthographic projection onto wgpu clip space (depth in 0..1).
pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let rcp_width = 1.0 / (right - left);
    let rcp_height = 1.0 / (top - bottom);
    let rcp_depth = 1.0 / (near - far);
    [
        [2.0 * rcp_width, 0.0, 0.0, 0.0],
        [0.0, 2.0 * rcp_height, 0.0, 0.0],
        [0.0, 0.0, rcp_depth, 0.0],
        [
            -(left + right) * rcp_width,
            -(top + bottom) * rcp_height,
            rcp_depth * near,
            1.0,
        ],
    ]
}

/// `a * b`, so `b` is applied to a point first.
pub fn multiply(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0; 4]; 4];
    for (column, out_column) in out.iter_mut().enumerate() {
        for (row, cell) in out_column.iter_mut().enumerate() {
            *cell = (0..4).map(|k| a[k][row] * b[column][k]).sum();
        }
    }
    out
}

/// CPU-side copy of the transform uniform block, written at reflected offsets.
pub(crate) struct UniformBlock {
    bytes: Vec<u8>,
    mvp_offset: usize,
    skew_offset: usize,
}

impl UniformBlock {
    pub fn new(locations: &ProgramLocations) -> Self {
        let size = (locations.uniform_block_size as usize).next_multiple_of(16).max(16);
        Self {
            bytes: vec![0; size],
            mvp_offset: locations.mvp.offset as usize,
            skew_offset: locations.skew.offset as usize,
        }
    }

    pub fn set_mvp(&mut self, matrix: &Mat4) {
        self.write(self.mvp_offset, bytemuck::cast_slice(matrix));
    }

    pub fn set_skew(&mut self, skew: [f32; 2]) {
        self.write(self.skew_offset, bytemuck::cast_slice(&skew));
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn write(&mut self, offset: usize, data: &[u8]) {
        let end = offset + data.len();
        if end > self.bytes.len() {
            self.bytes.resize(end.next_multiple_of(16), 0);
        }
        self.bytes[offset..end].copy_from_slice(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{TextureUnit, UniformLocation};

    fn transform(matrix: &Mat4, point: [f32; 3]) -> [f32; 4] {
        let input = [point[0], point[1], point[2], 1.0];
        let mut out = [0.0; 4];
        for (row, value) in out.iter_mut().enumerate() {
            *value = (0..4).map(|k| matrix[k][row] * input[k]).sum();
        }
        out
    }

    #[test]
    fn unit_orthographic_keeps_quad_corners() {
        let projection = orthographic(-1.0, 1.0, -1.0, 1.0, 0.0, 1.0);
        assert_eq!(transform(&projection, [1.0, 1.0, 0.0]), [1.0, 1.0, 0.0, 1.0]);
        assert_eq!(transform(&projection, [-1.0, -1.0, 0.0]), [-1.0, -1.0, 0.0, 1.0]);
    }

    #[test]
    fn depth_maps_into_zero_to_one() {
        let projection = orthographic(-1.0, 1.0, -1.0, 1.0, 0.0, 10.0);
        let far = transform(&projection, [0.0, 0.0, -10.0]);
        assert!((far[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn identity_is_neutral() {
        let projection = orthographic(-2.0, 2.0, -1.0, 1.0, 0.0, 1.0);
        assert_eq!(multiply(&projection, &IDENTITY), projection);
        assert_eq!(multiply(&IDENTITY, &projection), projection);
    }

    #[test]
    fn multiply_applies_right_operand_first() {
        let scale = orthographic(-2.0, 2.0, -2.0, 2.0, 0.0, 1.0);
        let shift = orthographic(0.0, 2.0, 0.0, 2.0, 0.0, 1.0);
        let combined = multiply(&scale, &shift);
        let step = transform(&scale, {
            let p = transform(&shift, [2.0, 2.0, 0.0]);
            [p[0], p[1], p[2]]
        });
        assert_eq!(transform(&combined, [2.0, 2.0, 0.0]), step);
    }

    #[test]
    fn uniform_block_writes_at_reflected_offsets() {
        let locations = ProgramLocations {
            position: 0,
            tex_coord: 1,
            mvp: UniformLocation { group: 0, binding: 0, offset: 16 },
            skew: UniformLocation { group: 0, binding: 0, offset: 0 },
            uniform_block_size: 80,
            colour: TextureUnit { group: 1, texture_binding: 0, sampler_binding: 1 },
            depth: TextureUnit { group: 1, texture_binding: 2, sampler_binding: 3 },
        };
        let mut block = UniformBlock::new(&locations);
        block.set_skew([0.5, -0.25]);
        block.set_mvp(&IDENTITY);

        let floats: Vec<f32> = block
            .as_bytes()
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        assert_eq!(block.size(), 80);
        assert_eq!(&floats[0..2], &[0.5, -0.25]);
        assert_eq!(floats[4], 1.0);
        assert_eq!(floats[9], 1.0);
    }
}
