/// Zero-cost wrapper over `parking_lot::Mutex`. `name` is accepted and
/// discarded — there is no tracer to label anything for.
pub struct DiagnosticMutex<T>(parking_lot::Mutex<T>);

impl<T> DiagnosticMutex<T> {
    #[inline]
    pub fn new(_name: &'static str, value: T) -> Self {
        Self(parking_lot::Mutex::new(value))
    }

    #[inline]
    pub fn lock(&self) -> parking_lot::MutexGuard<'_, T> {
        self.0.lock()
    }

    #[inline]
    pub fn try_lock(&self) -> Option<parking_lot::MutexGuard<'_, T>> {
        self.0.try_lock()
    }
}

/// Zero-cost wrapper over `parking_lot::RwLock`.
pub struct DiagnosticRwLock<T>(parking_lot::RwLock<T>);

impl<T> DiagnosticRwLock<T> {
    #[inline]
    pub fn new(_name: &'static str, value: T) -> Self {
        Self(parking_lot::RwLock::new(value))
    }

    #[inline]
    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, T> {
        self.0.read()
    }

    #[inline]
    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, T> {
        self.0.write()
    }

    #[inline]
    pub fn try_read(&self) -> Option<parking_lot::RwLockReadGuard<'_, T>> {
        self.0.try_read()
    }

    #[inline]
    pub fn try_write(&self) -> Option<parking_lot::RwLockWriteGuard<'_, T>> {
        self.0.try_write()
    }
}
