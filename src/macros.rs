/// Lets a `Serialize + Deserialize` struct be stored in redis as a bincode blob,
/// usable both as a command argument and as a reply value.
#[macro_export]
macro_rules! impl_redis_rv {
    ($( $t:ty ),+) => {
        $(
            impl redis::ToRedisArgs for $t {
                fn write_redis_args<W>(&self, out: &mut W)
                where
                    W: ?Sized + redis::RedisWrite,
                {
                    // plain data structs always serialize
                    out.write_arg(&bincode::serialize(self).expect("bincode serialization failed"));
                }
            }

            impl redis::FromRedisValue for $t {
                fn from_redis_value(v: &redis::Value) -> redis::RedisResult<Self> {
                    match v {
                        redis::Value::Data(data) => bincode::deserialize(data).map_err(|_| {
                            redis::RedisError::from((
                                redis::ErrorKind::TypeError,
                                "Stored value is not a valid bincode payload",
                            ))
                        }),
                        _ => Err(redis::RedisError::from((
                            redis::ErrorKind::TypeError,
                            "Response type not convertible",
                        ))),
                    }
                }
            }
        )+
    };
}
