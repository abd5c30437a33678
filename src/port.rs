use embedded_hal_async::i2c::I2c;

use crate::error::{Error, Result};
use crate::registers::{Field, Reg};

/// 7-bit bus address of the charger block.
pub const DEFAULT_ADDRESS: u8 = 0x3d;

/// Byte-wide register access over I2C.
///
/// `update` is a plain read, merge, write. It is not atomic on the bus, so callers hold the
/// charger lock around it.
pub struct RegisterPort<D> {
    i2c_dev: D,
    addr: u8,
}

impl<D: I2c> RegisterPort<D> {
    pub fn new(i2c_dev: D, addr: u8) -> Self {
        RegisterPort { i2c_dev, addr }
    }

    pub fn release(self) -> D {
        self.i2c_dev
    }

    pub async fn read(&mut self, reg: Reg) -> Result<u8, D::Error> {
        let mut val = 0u8;
        self.i2c_dev
            .write_read(
                self.addr,
                core::slice::from_ref(&reg.to_u8()),
                core::slice::from_mut(&mut val),
            )
            .await
            .map_err(Error::Bus)?;
        Ok(val)
    }

    pub async fn write(&mut self, reg: Reg, val: u8) -> Result<(), D::Error> {
        let buf = [reg.to_u8(), val];
        self.i2c_dev
            .write(self.addr, &buf)
            .await
            .map_err(Error::Bus)
    }

    /// Replace the bits selected by `mask` with the same bits of `val`.
    pub async fn update(&mut self, reg: Reg, val: u8, mask: u8) -> Result<(), D::Error> {
        self.modify(reg, |old| (old & !mask) | (val & mask)).await
    }

    pub async fn modify<F: FnOnce(u8) -> u8>(&mut self, reg: Reg, func: F) -> Result<(), D::Error> {
        let val = self.read(reg).await?;
        self.write(reg, func(val)).await
    }

    pub async fn read_field(&mut self, field: Field) -> Result<u8, D::Error> {
        self.read(field.reg).await.map(|raw| field.decode(raw))
    }

    pub async fn write_field(&mut self, field: Field, value: u8) -> Result<(), D::Error> {
        let mask = field.mask();
        self.update(field.reg, field.encode(value), mask).await
    }

    pub async fn set_flag(&mut self, field: Field, on: bool) -> Result<(), D::Error> {
        self.write_field(field, on as u8).await
    }
}
