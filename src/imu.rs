//! QMI8658 six-axis IMU over embedded-hal I2C, reporting the motion samples
//! the wake gesture consumes.

use core::fmt::Debug;

use embedded_hal::i2c;

use crate::gesture::MotionSample;

pub const DEFAULT_I2C_ADDR: u8 = 0x6B; // AD0 pulled high

const REG_WHO_AM_I: u8 = 0x00;
const REG_CTRL1: u8 = 0x02; // accel config
const REG_CTRL2: u8 = 0x03; // gyro config
const REG_CTRL7: u8 = 0x08; // sensor enable
const REG_CTRL8: u8 = 0x09; // reset / misc
const REG_ACC_START: u8 = 0x35; // AX_L .. GZ_H

// Some revisions report 0x05, others 0x0F
const WHO_AM_I_IDS: [u8; 2] = [0x05, 0x0F];

const CTRL1_ACCEL_8G_1KHZ: u8 = 0x60;
const CTRL2_GYRO_512DPS_1KHZ: u8 = 0x64;
const CTRL7_ACCEL_GYRO_ON: u8 = 0x03;
const CTRL8_SOFT_RESET: u8 = 0x10;

#[derive(Debug, thiserror::Error)]
pub enum ImuError<E: Debug> {
    #[error("i2c bus error: {0:?}")]
    Bus(E),
    #[error("unexpected WHO_AM_I {0:#04x}")]
    BadWhoAmI(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImuSample {
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
}

/// Raw counts per unit for the configured full-scale ranges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImuScale {
    pub accel_lsb_per_g: f32,
    pub gyro_lsb_per_dps: f32,
}

impl Default for ImuScale {
    // +/-8 g and +/-512 dps
    fn default() -> Self {
        Self {
            accel_lsb_per_g: 4096.0,
            gyro_lsb_per_dps: 64.0,
        }
    }
}

impl ImuSample {
    pub fn to_motion(&self, scale: ImuScale) -> [MotionSample; 2] {
        let g = crate::gesture::GRAVITY_EARTH;
        let accel = self.accel.map(|v| v as f32 / scale.accel_lsb_per_g * g);
        let gyro = self
            .gyro
            .map(|v| (v as f32 / scale.gyro_lsb_per_dps).to_radians());
        [
            MotionSample::accelerometer(accel[0], accel[1], accel[2]),
            MotionSample::gyroscope(gyro[0], gyro[1], gyro[2]),
        ]
    }
}

pub struct Qmi8658<I2C> {
    i2c: I2C,
    address: u8,
    scale: ImuScale,
}

impl<I2C> Qmi8658<I2C>
where
    I2C: i2c::I2c,
{
    // Probe and configure the chip
    pub fn new(i2c: I2C, address: u8) -> Result<Self, ImuError<I2C::Error>> {
        let mut this = Self {
            i2c,
            address,
            scale: ImuScale::default(),
        };
        this.init()?;
        Ok(this)
    }

    pub fn who_am_i(&mut self) -> Result<u8, ImuError<I2C::Error>> {
        self.read_reg(REG_WHO_AM_I)
    }

    pub fn scale(&self) -> ImuScale {
        self.scale
    }

    fn init(&mut self) -> Result<(), ImuError<I2C::Error>> {
        let who = self.who_am_i()?;
        if !WHO_AM_I_IDS.contains(&who) {
            return Err(ImuError::BadWhoAmI(who));
        }

        self.write_reg(REG_CTRL8, CTRL8_SOFT_RESET)?;
        self.write_reg(REG_CTRL1, CTRL1_ACCEL_8G_1KHZ)?;
        self.write_reg(REG_CTRL2, CTRL2_GYRO_512DPS_1KHZ)?;
        self.write_reg(REG_CTRL7, CTRL7_ACCEL_GYRO_ON)?;
        Ok(())
    }

    fn write_reg(&mut self, reg: u8, val: u8) -> Result<(), ImuError<I2C::Error>> {
        self.i2c
            .write(self.address, &[reg, val])
            .map_err(ImuError::Bus)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, ImuError<I2C::Error>> {
        let mut out = [0u8];
        self.i2c
            .write_read(self.address, &[reg], &mut out)
            .map_err(ImuError::Bus)?;
        Ok(out[0])
    }

    pub fn read_sample(&mut self) -> Result<ImuSample, ImuError<I2C::Error>> {
        let mut buf = [0u8; 12];
        self.i2c
            .write_read(self.address, &[REG_ACC_START], &mut buf)
            .map_err(ImuError::Bus)?;

        let word = |i: usize| i16::from_le_bytes([buf[i], buf[i + 1]]);
        Ok(ImuSample {
            accel: [word(0), word(2), word(4)],
            gyro: [word(6), word(8), word(10)],
        })
    }

    // One accelerometer and one gyroscope sample, in physical units
    pub fn read_motion(&mut self) -> Result<[MotionSample; 2], ImuError<I2C::Error>> {
        Ok(self.read_sample()?.to_motion(self.scale))
    }

    pub fn into_inner(self) -> I2C {
        self.i2c
    }
}
