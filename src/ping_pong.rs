/// One of the two N-body position arrays.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Generation {
  A,
  B,
}

impl Generation {
  pub fn index(self) -> usize {
    match self {
      Generation::A => 0,
      Generation::B => 1,
    }
  }

  fn other(self) -> Self {
    match self {
      Generation::A => Generation::B,
      Generation::B => Generation::A,
    }
  }
}

/// READ/WRITE role assignment over the two position generations.
///
/// Starts at READ = A, WRITE = B. Only [`crate::stepper::NBodyStepper`] can
/// swap, once at the end of each step, so the roles never alias and the
/// renderer always sees the last completed generation through [`Self::read`].
#[derive(Debug, PartialEq, Eq)]
pub struct PingPong {
  read: Generation,
  swaps: u64,
}

impl PingPong {
  pub(crate) fn new() -> Self {
    Self {
      read: Generation::A,
      swaps: 0,
    }
  }

  pub fn read(&self) -> Generation {
    self.read
  }

  pub fn write(&self) -> Generation {
    self.read.other()
  }

  /// Completed steps since startup.
  pub fn swaps(&self) -> u64 {
    self.swaps
  }

  pub(crate) fn swap(&mut self) {
    self.read = self.read.other();
    self.swaps += 1;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn roles_start_at_a_and_never_alias() {
    let mut roles = PingPong::new();
    assert_eq!(roles.read(), Generation::A);
    assert_eq!(roles.write(), Generation::B);
    for n in 1..=5u64 {
      roles.swap();
      assert_ne!(roles.read(), roles.write());
      assert_eq!(roles.read().index() as u64, n % 2);
      assert_eq!(roles.swaps(), n);
    }
  }
}
