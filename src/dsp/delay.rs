pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    /// Allocate a line that can hold `capacity` samples. The buffer is never
    /// resized afterwards.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(4)],
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Largest fractional delay `read_interpolated` can honour.
    pub fn max_delay(&self) -> f32 {
        (self.buffer.len() - 2) as f32
    }

    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }
    }

    #[inline]
    fn index(&self, delay: usize) -> usize {
        let len = self.buffer.len();
        let delay = delay.clamp(1, len - 1);
        (self.write_pos + len - delay) % len
    }

    /// Sample written `delay` writes ago (1 = most recent).
    #[inline]
    pub fn read(&self, delay: usize) -> f32 {
        self.buffer[self.index(delay)]
    }

    /// Linear interpolation between the two neighbouring integer taps.
    #[inline]
    pub fn read_interpolated(&self, delay: f32) -> f32 {
        let delay = delay.clamp(1.0, self.max_delay());
        let whole = delay as usize;
        let frac = delay - whole as f32;
        let a = self.read(whole);
        let b = self.read(whole + 1);
        a + (b - a) * frac
    }

    /// Add `value` to the sample stored `delay` writes ago.
    #[inline]
    pub fn add_at(&mut self, delay: usize, value: f32) {
        let idx = self.index(delay);
        self.buffer[idx] += value;
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}
